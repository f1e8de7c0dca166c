#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use portfolio_api::config::AppConfig;
use portfolio_api::testing::{MemoryQueryClient, MemoryStorage};
use portfolio_api::{router, AppState};

pub const BOUNDARY: &str = "portfolio-test-boundary";

/// Router over in-memory backends, plus handles to inspect them
pub struct TestApp {
    pub router: Router,
    pub db: Arc<MemoryQueryClient>,
    pub storage: Arc<MemoryStorage>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::development())
    }

    pub fn with_secret(secret: &str) -> Self {
        let mut config = AppConfig::development();
        config.security.jwt_secret = secret.to_string();
        Self::with_config(config)
    }

    fn with_config(config: AppConfig) -> Self {
        let db = Arc::new(MemoryQueryClient::new());
        let storage = Arc::new(MemoryStorage::new());
        let state = AppState::new(db.clone(), storage.clone(), config);
        Self {
            router: router(state),
            db,
            storage,
        }
    }

    /// Send one request and decode the JSON envelope
    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body for {}", status))?
        };
        Ok((status, body))
    }

    pub async fn get(&self, uri: &str) -> Result<(StatusCode, Value)> {
        self.send(Request::get(uri).body(Body::empty())?).await
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?;
        self.send(request).await
    }

    pub async fn multipart(&self, method: Method, uri: &str, form: Form) -> Result<(StatusCode, Value)> {
        self.send(form.request(method, uri)?).await
    }

    pub fn seed_province(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.db.seed("provinces", vec![row(id, json!({ "name": name }))]);
        id
    }

    pub fn seed_city(&self, province_id: Uuid, name: &str, description: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.db.seed(
            "cities",
            vec![row(id, json!({ "province_id": province_id, "name": name, "description": description }))],
        );
        id
    }

    pub fn seed_tech_stack(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.db.seed(
            "tech_stacks",
            vec![row(id, json!({ "name": name, "category": "backend", "icon_url": null }))],
        );
        id
    }
}

/// Stored row with id and timestamps around `fields`
pub fn row(id: Uuid, fields: Value) -> Value {
    let now = Utc::now();
    let mut row = json!({ "id": id, "created_at": now, "updated_at": now });
    if let (Some(target), Value::Object(extra)) = (row.as_object_mut(), fields) {
        target.extend(extra);
    }
    row
}

/// Hand-built `multipart/form-data` body
#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(self, payload: Value) -> Self {
        self.text("payload", &payload.to_string())
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, content: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn request(mut self, method: Method, uri: &str) -> Result<Request<Body>> {
        self.body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Ok(Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(self.body))?)
    }
}
