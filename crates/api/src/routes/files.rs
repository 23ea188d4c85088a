//! File storage routes.

use std::path::PathBuf;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, Path, Query, State, multipart::Field},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use stowage_core::storage::{FileStorage, StorageError, UploadedFile};
use stowage_shared::AppError;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{AppState, error_response};

/// Creates the file routes.
pub fn routes<S>() -> Router<AppState<S>>
where
    S: FileStorage + 'static,
{
    Router::new()
        .route("/files", post(upload_file::<S>).delete(delete_file::<S>))
        .route("/files/exists", get(file_exists::<S>))
        .route("/files/raw/{*path}", put(put_raw::<S>))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response carrying the public URL of a stored file.
#[derive(Debug, Serialize)]
pub struct StoredFileResponse {
    /// Public URL of the file.
    pub url: String,
}

/// Query addressing a stored file by its public URL.
#[derive(Debug, Deserialize)]
pub struct FileUrlQuery {
    /// Public URL of the file.
    pub url: String,
}

/// Response for an existence check.
#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    /// Whether the file is stored.
    pub exists: bool,
}

// ============================================================================
// Upload spooling
// ============================================================================

/// A temp file holding an upload's bytes.
///
/// Call [`SpooledFile::remove`] once the upload is done. Dropping an
/// unremoved spool deletes the file as a fallback.
struct SpooledFile {
    path: PathBuf,
    removed: bool,
}

impl SpooledFile {
    fn new() -> Self {
        Self {
            path: std::env::temp_dir().join(format!("stowage-upload-{}", Uuid::new_v4())),
            removed: false,
        }
    }

    async fn remove(mut self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            debug!(path = %self.path.display(), error = %e, "Failed to remove spooled upload");
        }
        self.removed = true;
    }

    async fn write_field(&self, field: &mut Field<'_>) -> Result<u64, AppError> {
        let mut file = tokio::fs::File::create(&self.path)
            .await
            .map_err(|e| AppError::Internal(format!("failed to create temp file: {e}")))?;

        let mut written = 0u64;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("failed to write temp file: {e}")))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| AppError::Internal(format!("failed to write temp file: {e}")))?;

        Ok(written)
    }
}

impl Drop for SpooledFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Failed to remove spooled upload");
            }
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn storage_error_response(err: StorageError) -> Response {
    let err = AppError::from(err);
    if err.status_code() >= 500 {
        error!(error = %err, "Storage operation failed");
    }
    error_response(&err)
}

/// Split a relative path into its directory and file name.
fn split_relative_path(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, path),
    }
}

/// POST /files
///
/// Accepts a `multipart/form-data` body with a `file` field and an optional
/// `dir` field naming the target directory.
async fn upload_file<S>(State(state): State<AppState<S>>, mut multipart: Multipart) -> Response
where
    S: FileStorage + 'static,
{
    let mut target_dir: Option<String> = None;
    let mut upload: Option<(SpooledFile, UploadedFile)> = None;

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(&AppError::Validation(e.body_text())),
        };

        let field_name = field.name().map(String::from);
        match field_name.as_deref() {
            Some("dir") => match field.text().await {
                Ok(dir) => target_dir = Some(dir).filter(|d| !d.trim().is_empty()),
                Err(e) => return error_response(&AppError::Validation(e.body_text())),
            },
            Some("file") => {
                let name = field.file_name().unwrap_or("file").to_string();
                let content_type = field.content_type().map(String::from);
                let spooled = SpooledFile::new();
                let size = match spooled.write_field(&mut field).await {
                    Ok(size) => size,
                    Err(e) => return error_response(&e),
                };
                info!(name = %name, size, "Received upload");

                let file = UploadedFile {
                    path: spooled.path.clone(),
                    name,
                    content_type,
                };
                upload = Some((spooled, file));
            }
            _ => {}
        }
    }

    let Some((spooled, file)) = upload else {
        return error_response(&AppError::Validation(
            "multipart field 'file' is required".to_string(),
        ));
    };

    let result = state.storage.save(&file, target_dir.as_deref()).await;
    spooled.remove().await;

    match result {
        Ok(url) => (StatusCode::CREATED, Json(StoredFileResponse { url })).into_response(),
        Err(e) => storage_error_response(e),
    }
}

/// PUT /files/raw/{*path}
///
/// Stores the request body at exactly `path`.
async fn put_raw<S>(
    State(state): State<AppState<S>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: FileStorage + 'static,
{
    let content_length = body.len();
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());

    match state.storage.save_raw(body, &path, content_type).await {
        Ok(url) => {
            info!(path = %path, bytes = content_length, content_type = ?content_type, "Stored raw upload");
            (StatusCode::CREATED, Json(StoredFileResponse { url })).into_response()
        }
        Err(e) => storage_error_response(e),
    }
}

/// DELETE /files?url=...
async fn delete_file<S>(
    State(state): State<AppState<S>>,
    Query(query): Query<FileUrlQuery>,
) -> Response
where
    S: FileStorage + 'static,
{
    let path = match state.storage.url_to_path(&query.url) {
        Ok(path) => path,
        Err(e) => return storage_error_response(e),
    };
    let (dir, name) = split_relative_path(&path);

    match state.storage.delete(name, dir).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => storage_error_response(e),
    }
}

/// GET /files/exists?url=...
async fn file_exists<S>(
    State(state): State<AppState<S>>,
    Query(query): Query<FileUrlQuery>,
) -> Response
where
    S: FileStorage + 'static,
{
    let path = match state.storage.url_to_path(&query.url) {
        Ok(path) => path,
        Err(e) => return storage_error_response(e),
    };
    let (dir, name) = split_relative_path(&path);

    match state.storage.exists(name, dir).await {
        Ok(exists) => Json(ExistsResponse { exists }).into_response(),
        Err(e) => storage_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CDN, StubStorage};
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "stowage-test-boundary";

    fn app(storage: &Arc<StubStorage>) -> Router {
        routes::<StubStorage>().with_state(AppState {
            storage: Arc::clone(storage),
        })
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/files")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .expect("request")
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.expect("body").to_bytes();
        serde_json::from_slice(&body).expect("json")
    }

    #[rstest::rstest]
    #[case("2024/06/a.png", Some("2024/06"), "a.png")]
    #[case("a.png", None, "a.png")]
    fn test_split_relative_path(
        #[case] path: &str,
        #[case] dir: Option<&str>,
        #[case] name: &str,
    ) {
        assert_eq!(split_relative_path(path), (dir, name));
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_returns_url() {
        let storage = Arc::new(StubStorage::default());
        let request = multipart_request(&[
            ("dir", None, b"avatars"),
            ("file", Some("me.png"), b"png-bytes"),
        ]);

        let response = app(&storage).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = json_body(response).await;
        assert_eq!(json["url"], format!("{CDN}/avatars/me.png"));

        let saved = storage.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].path, "avatars/me.png");
        assert_eq!(saved[0].data, b"png-bytes");
        assert_eq!(saved[0].content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_upload_without_dir_uses_default() {
        let storage = Arc::new(StubStorage::default());
        let request = multipart_request(&[("file", Some("me.png"), b"png-bytes")]);

        let response = app(&storage).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(storage.saved()[0].path, "default/me.png");
    }

    #[tokio::test]
    async fn test_upload_removes_temp_file() {
        let storage = Arc::new(StubStorage::default());
        let request = multipart_request(&[("file", Some("me.png"), b"png-bytes")]);

        let response = app(&storage).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let spooled = storage.saved()[0].spooled_at.clone();
        assert!(!spooled.exists());
    }

    #[tokio::test]
    async fn test_upload_removes_temp_file_on_failure() {
        let storage = Arc::new(StubStorage::failing());
        let request = multipart_request(&[("file", Some("me.png"), b"png-bytes")]);

        let response = app(&storage).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let spooled = storage.attempted().expect("save was attempted");
        assert!(!spooled.exists());
    }

    #[tokio::test]
    async fn test_spooled_file_remove() {
        let spooled = SpooledFile::new();
        tokio::fs::write(&spooled.path, b"data").await.expect("write spool");
        let path = spooled.path.clone();

        spooled.remove().await;

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_spooled_file_drop_fallback() {
        let spooled = SpooledFile::new();
        tokio::fs::write(&spooled.path, b"data").await.expect("write spool");
        let path = spooled.path.clone();

        drop(spooled);

        assert!(!path.exists());
    }

    #[test]
    fn test_spooled_file_drop_without_file() {
        let spooled = SpooledFile::new();
        assert!(!spooled.path.exists());
        drop(spooled);
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let storage = Arc::new(StubStorage::default());
        let request = multipart_request(&[("dir", None, b"avatars")]);

        let response = app(&storage).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"], "VALIDATION_ERROR");
        assert!(storage.saved().is_empty());
    }

    #[tokio::test]
    async fn test_upload_transport_failure() {
        let storage = Arc::new(StubStorage::failing());
        let request = multipart_request(&[("file", Some("me.png"), b"png-bytes")]);

        let response = app(&storage).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error"], "EXTERNAL_SERVICE_ERROR");
    }

    #[tokio::test]
    async fn test_put_raw() {
        let storage = Arc::new(StubStorage::default());
        let request = Request::builder()
            .method("PUT")
            .uri("/files/raw/reports/2024/q2.csv")
            .header(CONTENT_TYPE, "text/csv")
            .body(Body::from("a,b\n1,2\n"))
            .expect("request");

        let response = app(&storage).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = json_body(response).await;
        assert_eq!(json["url"], format!("{CDN}/reports/2024/q2.csv"));
        let saved = storage.saved();
        assert_eq!(saved[0].data, b"a,b\n1,2\n");
        assert_eq!(saved[0].content_type.as_deref(), Some("text/csv"));
    }

    #[tokio::test]
    async fn test_put_raw_rejects_traversal() {
        let storage = Arc::new(StubStorage::default());
        let request = Request::builder()
            .method("PUT")
            .uri("/files/raw/a/../b.txt")
            .body(Body::from("x"))
            .expect("request");

        let response = app(&storage).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(storage.saved().is_empty());
    }

    #[tokio::test]
    async fn test_exists_and_delete_by_url() {
        let storage = Arc::new(StubStorage::default());
        storage.insert("2024/06/a.png", b"data");
        let url = format!("{CDN}/2024/06/a.png");

        let response = app(&storage)
            .oneshot(
                Request::builder()
                    .uri(format!("/files/exists?url={url}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["exists"], true);

        let response = app(&storage)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/files?url={url}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!storage.contains("2024/06/a.png"));

        // Deleting again still succeeds.
        let response = app(&storage)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/files?url={url}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_delete_foreign_url() {
        let storage = Arc::new(StubStorage::default());

        let response = app(&storage)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/files?url=https://elsewhere.example.com/a.png")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
