//! API route definitions.

use axum::Router;
use stowage_core::storage::FileStorage;

use crate::AppState;

pub mod files;
pub mod health;

/// Creates the API router with all routes.
pub fn api_routes<S>() -> Router<AppState<S>>
where
    S: FileStorage + 'static,
{
    Router::new().merge(health::routes()).merge(files::routes())
}
