//! Redirects requests for stored files to their CDN location.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use stowage_core::storage::FileStorage;
use stowage_shared::AppError;
use tracing::{debug, warn};

use crate::error_response;

/// State for the serve middleware.
pub struct ServeState<S> {
    storage: Arc<S>,
    mount: String,
}

impl<S> Clone for ServeState<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            mount: self.mount.clone(),
        }
    }
}

impl<S> ServeState<S> {
    /// Serve stored files under `mount`, e.g. `/content`.
    pub fn new(storage: Arc<S>, mount: &str) -> Self {
        let mount = mount.trim().trim_end_matches('/');
        let mount = if mount.is_empty() || mount.starts_with('/') {
            mount.to_string()
        } else {
            format!("/{mount}")
        };
        Self { storage, mount }
    }

    /// Mount point with no trailing slash. Empty when mounted at the root.
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Relative file path a request path addresses, if any.
    ///
    /// Returns `None` for paths outside the mount and for the mount itself.
    fn relative_path<'p>(&self, path: &'p str) -> Option<&'p str> {
        let rest = if self.mount.is_empty() {
            if path.starts_with("/api/") {
                return None;
            }
            path
        } else {
            let rest = path.strip_prefix(self.mount.as_str())?;
            if !rest.is_empty() && !rest.starts_with('/') {
                return None;
            }
            rest
        };

        let rest = rest.trim_start_matches('/');
        (!rest.is_empty()).then_some(rest)
    }
}

/// Serve middleware.
///
/// `GET` and `HEAD` requests for a file under the mount point are answered
/// with a permanent redirect to the file's CDN URL. Everything else,
/// including the bare mount point, is passed on unchanged.
pub async fn serve<S>(State(state): State<ServeState<S>>, request: Request, next: Next) -> Response
where
    S: FileStorage + 'static,
{
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }

    let Some(relative_path) = state.relative_path(request.uri().path()) else {
        return next.run(request).await;
    };

    match state.storage.serve_url(relative_path) {
        Ok(url) => {
            debug!(path = %relative_path, url = %url, "Redirecting to CDN");
            Redirect::permanent(&url).into_response()
        }
        Err(e) => {
            warn!(path = %relative_path, error = %e, "Rejected serve request");
            error_response(&AppError::from(e))
        }
    }
}
