//! HTTP surface: article CRUD, digest triggers and generated audio

mod error;
mod news;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use error::ApiError;
pub use news::{CreateNewsRequest, FetchParams, GlobalFetchParams};

use crate::config::AppConfig;
use crate::digest::DigestService;
use crate::storage::Database;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Absent when news or AI credentials are not configured
    pub digest: Option<Arc<DigestService>>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the application router
pub fn router(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", news::routes())
        .nest_service("/static", ServeDir::new(config.static_dir()))
        .layer(cors_layer(&config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
