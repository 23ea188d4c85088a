//! S3 file storage adapter.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use super::chunk::ChunkReader;
use super::client::ObjectStoreClient;
use super::config::StorageConfig;
use super::error::StorageError;
use super::key::{KeyBuilder, ObjectKey};
use super::multipart::MultipartUpload;
use super::naming::{default_target_dir, join_path, unique_file_name};

/// A file waiting on local disk to be stored.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Location of the file's bytes.
    pub path: PathBuf,
    /// Name the file was uploaded with.
    pub name: String,
    /// MIME type reported by the uploader.
    pub content_type: Option<String>,
}

/// Operations a file storage backend offers.
pub trait FileStorage: Send + Sync {
    /// Store a file and return its public URL.
    fn save(
        &self,
        file: &UploadedFile,
        target_dir: Option<&str>,
    ) -> impl std::future::Future<Output = Result<String, StorageError>> + Send;

    /// Store raw bytes at an exact relative path and return its public URL.
    fn save_raw(
        &self,
        data: Bytes,
        target_path: &str,
        content_type: Option<&str>,
    ) -> impl std::future::Future<Output = Result<String, StorageError>> + Send;

    /// Check whether a file is stored.
    fn exists(
        &self,
        file_name: &str,
        target_dir: Option<&str>,
    ) -> impl std::future::Future<Output = Result<bool, StorageError>> + Send;

    /// Remove a stored file. Removing an absent file succeeds.
    fn delete(
        &self,
        file_name: &str,
        target_dir: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Read a stored file's bytes.
    fn read(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Bytes, StorageError>> + Send;

    /// Translate a public URL back to its relative path.
    fn url_to_path(&self, url: &str) -> Result<String, StorageError>;

    /// Public URL a relative path is served from.
    fn serve_url(&self, relative_path: &str) -> Result<String, StorageError>;
}

/// File storage backed by an S3-compatible bucket and served through a CDN.
pub struct S3Storage<C> {
    config: StorageConfig,
    keys: KeyBuilder,
    client: Arc<C>,
}

impl<C: ObjectStoreClient> S3Storage<C> {
    /// Create a new storage adapter.
    pub fn new(config: StorageConfig, client: Arc<C>) -> Self {
        let keys = KeyBuilder::new(&config);
        Self {
            config,
            keys,
            client,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Get the key builder.
    pub fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    /// Whether a file of `size` bytes goes through multipart upload.
    ///
    /// Empty files always take the single-request path since a multipart
    /// upload needs at least one part.
    pub fn uses_multipart(&self, size: u64) -> bool {
        size > 0 && size >= self.config.multipart_upload_threshold()
    }

    async fn upload(&self, key: &ObjectKey, file: &UploadedFile) -> Result<(), StorageError> {
        let size = tokio::fs::metadata(&file.path)
            .await
            .map_err(StorageError::StreamReadFailure)?
            .len();

        if self.uses_multipart(size) {
            debug!(key = %key, size, "Using multipart upload");
            let chunks =
                ChunkReader::open(&file.path, self.config.multipart_chunk_size()).await?;
            MultipartUpload::new(
                self.client.as_ref(),
                key.clone(),
                file.content_type.clone(),
                chunks,
            )
            .run()
            .await?;
        } else {
            debug!(key = %key, size, "Using single upload");
            let body = tokio::fs::read(&file.path)
                .await
                .map_err(StorageError::StreamReadFailure)?;
            self.client
                .put_object(key, Bytes::from(body), file.content_type.as_deref())
                .await?;
        }
        Ok(())
    }
}

fn require_file_name(file_name: &str) -> Result<(), StorageError> {
    if file_name.trim().is_empty() {
        return Err(StorageError::invalid_argument("file name must not be empty"));
    }
    Ok(())
}

impl<C: ObjectStoreClient> FileStorage for S3Storage<C> {
    async fn save(
        &self,
        file: &UploadedFile,
        target_dir: Option<&str>,
    ) -> Result<String, StorageError> {
        let dir = target_dir.map_or_else(default_target_dir, String::from);
        let relative_path = unique_file_name(self, &dir, &file.name).await?;
        let key = self.keys.build_key(&relative_path)?;

        self.upload(&key, file).await?;

        let url = self.keys.url_for(&key);
        info!(key = %key, url = %url, "Stored file");
        Ok(url)
    }

    async fn save_raw(
        &self,
        data: Bytes,
        target_path: &str,
        content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        if target_path.trim().is_empty() {
            return Err(StorageError::invalid_argument("target path must not be empty"));
        }
        let key = self.keys.build_key(target_path)?;

        self.client.put_object(&key, data, content_type).await?;

        let url = self.keys.url_for(&key);
        info!(key = %key, url = %url, "Stored raw bytes");
        Ok(url)
    }

    async fn exists(&self, file_name: &str, target_dir: Option<&str>) -> Result<bool, StorageError> {
        require_file_name(file_name)?;
        let key = self.keys.build_key(&join_path(target_dir, file_name))?;

        match self.client.head_object(&key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, file_name: &str, target_dir: Option<&str>) -> Result<(), StorageError> {
        require_file_name(file_name)?;
        let key = self.keys.build_key(&join_path(target_dir, file_name))?;

        match self.client.delete_object(&key).await {
            Ok(()) => {
                info!(key = %key, "Deleted file");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(key = %key, "File already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn read(&self, _path: &str) -> Result<Bytes, StorageError> {
        Err(StorageError::Unsupported(
            "read: files are served from the CDN, not through this storage",
        ))
    }

    fn url_to_path(&self, url: &str) -> Result<String, StorageError> {
        self.keys.url_to_relative_path(url)
    }

    fn serve_url(&self, relative_path: &str) -> Result<String, StorageError> {
        let key = self.keys.build_key(relative_path)?;
        Ok(self.keys.url_for(&key))
    }
}
