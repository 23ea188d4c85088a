//! Storage configuration types.

use stowage_shared::StorageSettings;

use super::error::StorageError;
use super::key::normalize_path;

/// Smallest part size S3 accepts for every part but the last (5 MiB).
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Connection options handed to the S3 client unchanged.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// AWS region. Falls back to the SDK's region chain when absent.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    pub endpoint: Option<String>,
    /// Static access key ID.
    pub access_key_id: Option<String>,
    /// Static secret access key.
    pub secret_access_key: Option<String>,
    /// Use path-style addressing.
    pub force_path_style: bool,
}

/// Validated, immutable storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    bucket: String,
    storage_path: String,
    tenant_prefix: Option<String>,
    cdn_url: String,
    multipart_upload_threshold: u64,
    multipart_chunk_size: usize,
    transport: TransportOptions,
}

impl StorageConfig {
    /// Create a validated storage configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required value is empty or the
    /// chunk size is below [`MIN_PART_SIZE`].
    pub fn new(
        bucket: impl Into<String>,
        storage_path: &str,
        cdn_url: &str,
        multipart_upload_threshold: u64,
        multipart_chunk_size: u64,
    ) -> Result<Self, StorageError> {
        let bucket = bucket.into().trim().to_string();
        if bucket.is_empty() {
            return Err(StorageError::missing_field("bucket"));
        }

        let storage_path = normalize_path(storage_path)
            .map_err(|e| StorageError::configuration(format!("storage_path: {e}")))?
            .ok_or_else(|| StorageError::missing_field("storage_path"))?;

        let cdn_url = cdn_url.trim().trim_end_matches('/').to_string();
        if cdn_url.is_empty() {
            return Err(StorageError::missing_field("cdn_url"));
        }

        if multipart_chunk_size < MIN_PART_SIZE {
            return Err(StorageError::configuration(format!(
                "multipart_chunk_size {multipart_chunk_size} is below the minimum part size {MIN_PART_SIZE}"
            )));
        }
        let multipart_chunk_size = usize::try_from(multipart_chunk_size).map_err(|_| {
            StorageError::configuration("multipart_chunk_size does not fit in memory")
        })?;

        Ok(Self {
            bucket,
            storage_path,
            tenant_prefix: None,
            cdn_url,
            multipart_upload_threshold,
            multipart_chunk_size,
            transport: TransportOptions::default(),
        })
    }

    /// Validate raw settings into a storage configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first missing or invalid field.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        let bucket = settings
            .bucket
            .as_deref()
            .ok_or_else(|| StorageError::missing_field("bucket"))?;
        let storage_path = settings
            .storage_path
            .as_deref()
            .ok_or_else(|| StorageError::missing_field("storage_path"))?;
        let cdn_url = settings
            .cdn_url
            .as_deref()
            .ok_or_else(|| StorageError::missing_field("cdn_url"))?;
        let threshold = settings
            .multipart_upload_threshold
            .ok_or_else(|| StorageError::missing_field("multipart_upload_threshold"))?;
        let chunk_size = settings
            .multipart_chunk_size
            .ok_or_else(|| StorageError::missing_field("multipart_chunk_size"))?;

        let mut config = Self::new(bucket, storage_path, cdn_url, threshold, chunk_size)?;
        if let Some(prefix) = settings.tenant_prefix.as_deref() {
            config = config.with_tenant_prefix(prefix)?;
        }

        Ok(config.with_transport(TransportOptions {
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
            access_key_id: settings.access_key_id.clone(),
            secret_access_key: settings.secret_access_key.clone(),
            force_path_style: settings.force_path_style,
        }))
    }

    /// Set the tenant prefix. A blank prefix means no tenant.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the prefix contains `..` segments.
    pub fn with_tenant_prefix(mut self, prefix: &str) -> Result<Self, StorageError> {
        self.tenant_prefix = normalize_path(prefix)
            .map_err(|e| StorageError::configuration(format!("tenant_prefix: {e}")))?;
        Ok(self)
    }

    /// Set transport options.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    /// Bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Storage root prefix, without surrounding slashes.
    #[must_use]
    pub fn storage_path(&self) -> &str {
        &self.storage_path
    }

    /// Tenant prefix, if any.
    #[must_use]
    pub fn tenant_prefix(&self) -> Option<&str> {
        self.tenant_prefix.as_deref()
    }

    /// CDN base URL without a trailing slash.
    #[must_use]
    pub fn cdn_url(&self) -> &str {
        &self.cdn_url
    }

    /// Files at or above this size use multipart upload.
    #[must_use]
    pub fn multipart_upload_threshold(&self) -> u64 {
        self.multipart_upload_threshold
    }

    /// Multipart chunk size in bytes.
    #[must_use]
    pub fn multipart_chunk_size(&self) -> usize {
        self.multipart_chunk_size
    }

    /// Transport options.
    #[must_use]
    pub fn transport(&self) -> &TransportOptions {
        &self.transport
    }
}
