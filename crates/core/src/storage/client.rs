//! Object store transport contract.

use bytes::Bytes;

use super::error::StorageError;
use super::key::ObjectKey;
use super::multipart::PartRecord;

/// Metadata returned by a HEAD request.
#[derive(Debug, Clone, Default)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub content_length: u64,
    /// Stored content type.
    pub content_type: Option<String>,
    /// Entity tag.
    pub etag: Option<String>,
}

/// Transport trait for an S3-compatible object store.
///
/// Implementations report a missing object as [`StorageError::NotFound`] and
/// every other failure as [`StorageError::Operation`]. Retries, timeouts and
/// credentials are the implementation's business.
pub trait ObjectStoreClient: Send + Sync {
    /// Store an object in a single request.
    fn put_object(
        &self,
        key: &ObjectKey,
        body: Bytes,
        content_type: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Fetch object metadata without the body.
    fn head_object(
        &self,
        key: &ObjectKey,
    ) -> impl std::future::Future<Output = Result<ObjectMeta, StorageError>> + Send;

    /// Remove an object.
    fn delete_object(
        &self,
        key: &ObjectKey,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Open a multipart session. `None` means the store returned no upload id.
    fn create_multipart_upload(
        &self,
        key: &ObjectKey,
        content_type: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Upload one part. `None` means the store returned no etag.
    fn upload_part(
        &self,
        key: &ObjectKey,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> impl std::future::Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Assemble the uploaded parts into the final object.
    fn complete_multipart_upload(
        &self,
        key: &ObjectKey,
        upload_id: &str,
        parts: &[PartRecord],
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Discard a multipart session and its parts.
    fn abort_multipart_upload(
        &self,
        key: &ObjectKey,
        upload_id: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// A single call received by the mock store.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Put { key: String, len: usize },
        Head { key: String },
        Delete { key: String },
        Create { key: String, content_type: Option<String> },
        UploadPart { key: String, part_number: u32, len: usize },
        Complete { key: String, part_numbers: Vec<u32> },
        Abort { key: String, upload_id: String },
    }

    /// Failure switches for the mock store.
    #[derive(Debug, Default, Clone)]
    pub struct Faults {
        pub omit_upload_id: bool,
        pub fail_create: bool,
        pub fail_part: Option<u32>,
        pub omit_etag_part: Option<u32>,
        pub fail_complete: bool,
        pub fail_abort: bool,
        pub fail_head: bool,
        pub fail_delete: bool,
        pub fail_put: bool,
        pub every_key_exists: bool,
    }

    /// In-memory object store that records every call.
    #[derive(Default)]
    pub struct MockObjectStore {
        pub faults: Faults,
        calls: Mutex<Vec<Call>>,
        objects: Mutex<HashMap<String, Bytes>>,
        content_types: Mutex<HashMap<String, String>>,
        sessions: Mutex<HashMap<String, Vec<(u32, Bytes)>>>,
    }

    impl MockObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_faults(faults: Faults) -> Self {
            Self {
                faults,
                ..Self::default()
            }
        }

        pub fn insert(&self, key: &str, body: &'static [u8]) {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), Bytes::from_static(body));
        }

        pub fn object(&self, key: &str) -> Option<Bytes> {
            self.objects.lock().unwrap().get(key).cloned()
        }

        pub fn content_type(&self, key: &str) -> Option<String> {
            self.content_types.lock().unwrap().get(key).cloned()
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn open_sessions(&self) -> usize {
            self.sessions.lock().unwrap().len()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ObjectStoreClient for MockObjectStore {
        async fn put_object(
            &self,
            key: &ObjectKey,
            body: Bytes,
            content_type: Option<&str>,
        ) -> Result<(), StorageError> {
            self.record(Call::Put {
                key: key.to_string(),
                len: body.len(),
            });
            if self.faults.fail_put {
                return Err(StorageError::operation("put rejected"));
            }
            if let Some(content_type) = content_type {
                self.content_types
                    .lock()
                    .unwrap()
                    .insert(key.to_string(), content_type.to_string());
            }
            self.objects.lock().unwrap().insert(key.to_string(), body);
            Ok(())
        }

        async fn head_object(&self, key: &ObjectKey) -> Result<ObjectMeta, StorageError> {
            self.record(Call::Head {
                key: key.to_string(),
            });
            if self.faults.fail_head {
                return Err(StorageError::operation("head timed out"));
            }
            if self.faults.every_key_exists {
                return Ok(ObjectMeta::default());
            }
            self.objects
                .lock()
                .unwrap()
                .get(key.as_str())
                .map(|body| ObjectMeta {
                    content_length: body.len() as u64,
                    ..ObjectMeta::default()
                })
                .ok_or_else(|| StorageError::not_found(key.as_str()))
        }

        async fn delete_object(&self, key: &ObjectKey) -> Result<(), StorageError> {
            self.record(Call::Delete {
                key: key.to_string(),
            });
            if self.faults.fail_delete {
                return Err(StorageError::operation("delete rejected"));
            }
            self.objects
                .lock()
                .unwrap()
                .remove(key.as_str())
                .map(|_| ())
                .ok_or_else(|| StorageError::not_found(key.as_str()))
        }

        async fn create_multipart_upload(
            &self,
            key: &ObjectKey,
            content_type: Option<&str>,
        ) -> Result<Option<String>, StorageError> {
            self.record(Call::Create {
                key: key.to_string(),
                content_type: content_type.map(String::from),
            });
            if self.faults.fail_create {
                return Err(StorageError::operation("create rejected"));
            }
            if self.faults.omit_upload_id {
                return Ok(None);
            }
            let upload_id = format!("upload-{key}");
            self.sessions
                .lock()
                .unwrap()
                .insert(upload_id.clone(), Vec::new());
            Ok(Some(upload_id))
        }

        async fn upload_part(
            &self,
            key: &ObjectKey,
            upload_id: &str,
            part_number: u32,
            body: Bytes,
        ) -> Result<Option<String>, StorageError> {
            self.record(Call::UploadPart {
                key: key.to_string(),
                part_number,
                len: body.len(),
            });
            if self.faults.fail_part == Some(part_number) {
                return Err(StorageError::operation(format!(
                    "connection reset during part {part_number}"
                )));
            }
            self.sessions
                .lock()
                .unwrap()
                .get_mut(upload_id)
                .ok_or_else(|| StorageError::operation("no such upload"))?
                .push((part_number, body));
            if self.faults.omit_etag_part == Some(part_number) {
                return Ok(None);
            }
            Ok(Some(format!("\"etag-{part_number}\"")))
        }

        async fn complete_multipart_upload(
            &self,
            key: &ObjectKey,
            upload_id: &str,
            parts: &[PartRecord],
        ) -> Result<(), StorageError> {
            self.record(Call::Complete {
                key: key.to_string(),
                part_numbers: parts.iter().map(|p| p.part_number).collect(),
            });
            if self.faults.fail_complete {
                return Err(StorageError::operation("complete rejected"));
            }
            let uploaded = self
                .sessions
                .lock()
                .unwrap()
                .remove(upload_id)
                .ok_or_else(|| StorageError::operation("no such upload"))?;
            let mut body = Vec::new();
            for part in parts {
                let (_, bytes) = uploaded
                    .iter()
                    .find(|(n, _)| *n == part.part_number)
                    .ok_or_else(|| StorageError::operation("unknown part"))?;
                body.extend_from_slice(bytes);
            }
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), Bytes::from(body));
            Ok(())
        }

        async fn abort_multipart_upload(
            &self,
            key: &ObjectKey,
            upload_id: &str,
        ) -> Result<(), StorageError> {
            self.record(Call::Abort {
                key: key.to_string(),
                upload_id: upload_id.to_string(),
            });
            if self.faults.fail_abort {
                return Err(StorageError::operation("abort rejected"));
            }
            self.sessions.lock().unwrap().remove(upload_id);
            Ok(())
        }
    }
}
