use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::database::models::{Badge, City, Entity, Experience, Location, Project, Province, TechStack, Thread};
use crate::handlers::{health, resource};
use crate::middleware::{jwt_auth_middleware, request_id_middleware};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(resource_routes::<Province>())
        .merge(resource_routes::<City>())
        .merge(resource_routes::<Location>())
        .merge(resource_routes::<Experience>())
        .merge(resource_routes::<Project>())
        .merge(resource_routes::<TechStack>())
        .merge(resource_routes::<Badge>())
        .merge(resource_routes::<Thread>());

    let mut app = Router::new()
        // Public
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .nest("/api", api)
        // Writes require a bearer token when a secret is configured
        .layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
        .layer(DefaultBodyLimit::max(state.config.storage.max_upload_bytes))
        .layer(middleware::from_fn(request_id_middleware));

    if state.config.security.enable_cors {
        app = app.layer(cors_layer(&state.config.security));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// `/{collection}` and `/{collection}/:id`, collection names in kebab case
pub fn resource_routes<E: Entity>() -> Router<AppState> {
    let base = format!("/{}", E::COLLECTION.replace('_', "-"));
    let item = format!("{}/:id", base);

    Router::new()
        .route(&base, get(resource::list::<E>).post(resource::create::<E>))
        .route(
            &item,
            get(resource::get::<E>)
                .put(resource::update::<E>)
                .patch(resource::update::<E>)
                .delete(resource::delete::<E>),
        )
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
