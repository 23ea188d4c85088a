//! Storage error types.

use stowage_shared::AppError;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage configuration is missing a field or holds an invalid value.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// Caller supplied an empty or malformed path, file name or URL.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A tenant prefix is configured but the URL does not carry it.
    #[error("url '{url}' does not contain tenant prefix '{tenant_prefix}'")]
    MissingTenantPrefix {
        /// URL that was translated.
        url: String,
        /// Configured tenant prefix.
        tenant_prefix: String,
    },

    /// The URL does not carry the storage root segment.
    #[error("url '{url}' does not contain storage path '{storage_path}'")]
    MissingStoragePath {
        /// URL that was translated.
        url: String,
        /// Configured storage root.
        storage_path: String,
    },

    /// Object not found in the bucket.
    #[error("file not found: {key}")]
    NotFound {
        /// Object key that was not found.
        key: String,
    },

    /// Reading the local source file failed.
    #[error("failed to read source file: {0}")]
    StreamReadFailure(#[source] std::io::Error),

    /// The store did not open a multipart session.
    #[error("multipart upload initiation failed for {key}: {reason}")]
    InitiationFailed {
        /// Object key of the upload.
        key: String,
        /// What the store returned instead of a session.
        reason: String,
    },

    /// A part was accepted but came back without an etag.
    #[error("upload of part {part_number} failed: {reason}")]
    PartUploadFailed {
        /// 1-based part number.
        part_number: u32,
        /// Failure description.
        reason: String,
    },

    /// Transport-level failure reported by the object store.
    #[error("storage operation failed: {0}")]
    Operation(String),

    /// Operation is not offered by this storage backend.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

impl StorageError {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a configuration error for a missing required field.
    #[must_use]
    pub fn missing_field(field: &str) -> Self {
        Self::Configuration(format!("missing required field '{field}'"))
    }

    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an initiation failure.
    #[must_use]
    pub fn initiation_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InitiationFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a part upload failure.
    #[must_use]
    pub fn part_upload_failed(part_number: u32, reason: impl Into<String>) -> Self {
        Self::PartUploadFailed {
            part_number,
            reason: reason.into(),
        }
    }

    /// Create an operation error.
    #[must_use]
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Returns true if the store reported the object as absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidArgument(_)
            | StorageError::MissingTenantPrefix { .. }
            | StorageError::MissingStoragePath { .. } => Self::Validation(err.to_string()),
            StorageError::NotFound { .. } => Self::NotFound(err.to_string()),
            StorageError::Unsupported(_) => Self::Unsupported(err.to_string()),
            StorageError::Configuration(_) => Self::Configuration(err.to_string()),
            StorageError::StreamReadFailure(_) => Self::Internal(err.to_string()),
            StorageError::InitiationFailed { .. }
            | StorageError::PartUploadFailed { .. }
            | StorageError::Operation(_) => Self::ExternalService(err.to_string()),
        }
    }
}
