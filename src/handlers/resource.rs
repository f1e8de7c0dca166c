//! Generic CRUD handlers, instantiated once per entity by the router

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::header::CONTENT_TYPE,
    body::Bytes,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::Entity;
use crate::error::ApiError;
use crate::filter::ListOptions;
use crate::handlers::multipart::read_form;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{Attachments, Detailed, EntityService};
use crate::state::AppState;

/// GET /api/{collection} - search with filters, sort and pagination
pub async fn list<E: Entity>(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Vec<E>> {
    let options = ListOptions::from_query_pairs(&params, E::FILTERS)?;
    let (items, pagination) = EntityService::<E>::from_state(&state).search(options).await?;

    Ok(ApiResponse::success(items)
        .message(format!("Retrieved {} {} record(s)", pagination.total, E::NAME))
        .pagination(pagination))
}

/// GET /api/{collection}/:id - single record with related records
pub async fn get<E: Entity>(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Detailed<E>> {
    let id = parse_id(&id)?;
    let detailed = EntityService::<E>::from_state(&state).get(id).await?;
    Ok(ApiResponse::success(detailed).message(format!("Retrieved {}", E::NAME)))
}

/// POST /api/{collection} - JSON body, or multipart with a `payload` part plus files
pub async fn create<E: Entity>(State(state): State<AppState>, request: Request) -> ApiResult<Detailed<E>> {
    let (body, files) = read_body(&state, request, &list_fields::<E>()).await?;
    let input: E::Create = decode(body)?;

    let created = EntityService::<E>::from_state(&state).create(input, files).await?;
    Ok(ApiResponse::created(created).message(format!("Created {}", E::NAME)))
}

/// PUT|PATCH /api/{collection}/:id - partial update; omitted fields are kept
pub async fn update<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult<Detailed<E>> {
    let id = parse_id(&id)?;
    let (body, files) = read_body(&state, request, &list_fields::<E>()).await?;
    let patch: E::Patch = decode(body)?;

    let updated = EntityService::<E>::from_state(&state).update(id, patch, files).await?;
    Ok(ApiResponse::success(updated).message(format!("Updated {}", E::NAME)))
}

/// DELETE /api/{collection}/:id - returns the removed record
pub async fn delete<E: Entity>(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<E> {
    let id = parse_id(&id)?;
    let deleted = EntityService::<E>::from_state(&state).delete(id).await?;
    Ok(ApiResponse::success(deleted).message(format!("Deleted {}", E::NAME)))
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid id '{}': expected a UUID", raw)))
}

/// JSON or multipart body, dispatched on content type
async fn read_body(state: &AppState, request: Request, list_fields: &[&str]) -> Result<(Value, Attachments), ApiError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        return read_form(multipart, list_fields).await;
    }

    let bytes = Bytes::from_request(request, state).await.map_err(|e| {
        if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(e.body_text())
        } else {
            ApiError::bad_request(e.body_text())
        }
    })?;
    if bytes.is_empty() {
        return Err(ApiError::invalid_json("Request body is empty"));
    }
    let body = serde_json::from_slice(&bytes).map_err(|e| ApiError::invalid_json(format!("Invalid JSON: {}", e)))?;
    Ok((body, Attachments::new()))
}

/// Form keys that always hold a list of ids
fn list_fields<E: Entity>() -> Vec<&'static str> {
    E::ASSOCIATION.map(|association| association.ids_field).into_iter().collect()
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::invalid_json(format!("Invalid payload: {}", e)))
}
