//! Object key construction and CDN URL translation.
//!
//! Keys have the shape `[tenant_prefix/]storage_path/relative_path`. Every
//! component is joined on whole path segments, so a key never starts with a
//! slash and never contains empty or `.` segments.

use std::fmt;

use super::config::StorageConfig;
use super::error::StorageError;

/// Fully-qualified identifier of an object in the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Borrow the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a slash-separated path.
///
/// Repeated, leading and trailing separators and `.` segments are dropped.
/// Returns `None` when nothing is left.
pub(crate) fn normalize_path(path: &str) -> Result<Option<String>, StorageError> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(StorageError::invalid_argument(format!(
                    "path '{path}' must not contain '..' segments"
                )));
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        Ok(None)
    } else {
        Ok(Some(segments.join("/")))
    }
}

/// Strip `prefix` from `path` only when it is followed by a segment boundary.
fn strip_segments<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    path.strip_prefix(prefix)?.strip_prefix('/')
}

/// Maps relative paths to object keys and CDN URLs back to relative paths.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    storage_path: String,
    tenant_prefix: Option<String>,
    cdn_url: String,
}

impl KeyBuilder {
    /// Create a key builder from validated configuration.
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            storage_path: config.storage_path().to_string(),
            tenant_prefix: config.tenant_prefix().map(String::from),
            cdn_url: config.cdn_url().to_string(),
        }
    }

    /// Build the object key for a relative path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the path is empty after normalization or
    /// contains `..` segments.
    pub fn build_key(&self, relative_path: &str) -> Result<ObjectKey, StorageError> {
        let relative = normalize_path(relative_path)?
            .ok_or_else(|| StorageError::invalid_argument("relative path must not be empty"))?;

        let key = match &self.tenant_prefix {
            Some(tenant) => format!("{tenant}/{}/{relative}", self.storage_path),
            None => format!("{}/{relative}", self.storage_path),
        };
        Ok(ObjectKey(key))
    }

    /// Public URL of an object.
    #[must_use]
    pub fn url_for(&self, key: &ObjectKey) -> String {
        format!("{}/{key}", self.cdn_url)
    }

    /// Translate a previously issued CDN URL back to its relative path.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the URL is not under the CDN base or names no file
    /// - `MissingTenantPrefix` if the configured tenant segment is absent
    /// - `MissingStoragePath` if the storage root segment is absent
    pub fn url_to_relative_path(&self, url: &str) -> Result<String, StorageError> {
        let rest = strip_segments(url, &self.cdn_url).ok_or_else(|| {
            StorageError::invalid_argument(format!(
                "url '{url}' is not served from '{}'",
                self.cdn_url
            ))
        })?;

        let rest = match &self.tenant_prefix {
            Some(tenant) => {
                strip_segments(rest, tenant).ok_or_else(|| StorageError::MissingTenantPrefix {
                    url: url.to_string(),
                    tenant_prefix: tenant.clone(),
                })?
            }
            None => rest,
        };

        let rest = strip_segments(rest, &self.storage_path).ok_or_else(|| {
            StorageError::MissingStoragePath {
                url: url.to_string(),
                storage_path: self.storage_path.clone(),
            }
        })?;

        normalize_path(rest)?
            .ok_or_else(|| StorageError::invalid_argument(format!("url '{url}' names no file")))
    }
}
