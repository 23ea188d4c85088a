//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for storing and removing files
//! - The CDN redirect middleware for stored files
//! - JSON error responses

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use stowage_core::storage::FileStorage;
use stowage_shared::{AppError, ServerConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::serve::{ServeState, serve};

/// Application state shared across handlers.
pub struct AppState<S> {
    /// File storage backend.
    pub storage: Arc<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

/// Creates the main application router.
pub fn create_router<S>(state: AppState<S>, server: &ServerConfig) -> Router
where
    S: FileStorage + 'static,
{
    let serve_state = ServeState::new(Arc::clone(&state.storage), &server.serve_path);

    Router::new()
        .nest(
            "/api/v1",
            routes::api_routes().layer(DefaultBodyLimit::max(server.max_upload_bytes)),
        )
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(serve_state, serve::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Fallback for unknown routes.
async fn not_found() -> Response {
    error_response(&AppError::NotFound("route not found".to_string()))
}

/// Render an application error as a JSON response.
pub fn error_response(err: &AppError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "error": err.error_code(),
            "message": err.to_string()
        })),
    )
        .into_response()
}
