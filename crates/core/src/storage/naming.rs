//! Target directory and file name resolution for uploads.

use std::path::Path;

use chrono::{DateTime, Utc};

use super::error::StorageError;
use super::service::FileStorage;

/// Default upload directory for the current month, `YYYY/MM`.
pub fn default_target_dir() -> String {
    dated_dir(Utc::now())
}

/// Upload directory for a point in time, `YYYY/MM`.
pub fn dated_dir(now: DateTime<Utc>) -> String {
    now.format("%Y/%m").to_string()
}

/// Join a directory and a file name with a single separator.
pub fn join_path(dir: Option<&str>, file_name: &str) -> String {
    match dir.map(|d| d.trim_end_matches('/')) {
        Some(dir) if !dir.is_empty() => format!("{dir}/{file_name}"),
        _ => file_name.to_string(),
    }
}

/// Sanitize a file name for use in an object key.
///
/// Directory components are dropped. Only ASCII alphanumeric characters,
/// dots, hyphens, and underscores are kept; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}

/// Candidate names tried before giving up on a directory.
pub(crate) const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Resolve a relative path in `dir` that no stored object uses yet.
///
/// Tries `name.ext`, then `name-1.ext`, `name-2.ext`, ... until
/// [`FileStorage::exists`] reports the path as free.
///
/// # Errors
///
/// Propagates lookup failures other than not-found, and fails once
/// `MAX_NAME_ATTEMPTS` candidates are all taken.
pub async fn unique_file_name<S>(storage: &S, dir: &str, name: &str) -> Result<String, StorageError>
where
    S: FileStorage + ?Sized,
{
    let name = sanitize_file_name(name);
    let path = Path::new(&name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&name)
        .to_string();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let mut candidate = name.clone();
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        if !storage.exists(&candidate, Some(dir)).await? {
            return Ok(join_path(Some(dir), &candidate));
        }
        candidate = format!("{stem}-{attempt}{ext}");
    }

    Err(StorageError::operation(format!(
        "no free name for '{name}' in '{dir}' after {MAX_NAME_ATTEMPTS} attempts"
    )))
}
