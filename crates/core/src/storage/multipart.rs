//! Multipart upload engine.
//!
//! One upload is driven through an explicit state machine:
//!
//! ```text
//! Initiating ──► Uploading ──► Completing ──► Done
//!      │             │  ▲           │
//!      │             └──┘ one part  │
//!      │             │              │
//!      ▼             ▼              ▼
//!    Failed ◄──── Aborting ◄────────┘
//! ```
//!
//! Parts are uploaded one at a time in file order, so only a single chunk is
//! held in memory. Once a session exists every failure goes through
//! `Aborting`, and the error that caused the abort is the one returned.

use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use super::chunk::ChunkReader;
use super::client::ObjectStoreClient;
use super::error::StorageError;
use super::key::ObjectKey;

/// A part accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRecord {
    /// 1-based part number.
    pub part_number: u32,
    /// Entity tag returned for the part.
    pub etag: String,
}

/// State of one multipart session, local to a single upload.
#[derive(Debug)]
pub struct UploadSession {
    upload_id: String,
    key: ObjectKey,
    parts: Vec<PartRecord>,
}

impl UploadSession {
    fn new(upload_id: String, key: ObjectKey) -> Self {
        Self {
            upload_id,
            key,
            parts: Vec::new(),
        }
    }

    /// Upload ID issued by the store.
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Target object key.
    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    /// Parts uploaded so far, in part-number order.
    pub fn parts(&self) -> &[PartRecord] {
        &self.parts
    }

    fn next_part_number(&self) -> u32 {
        self.parts.last().map_or(1, |p| p.part_number + 1)
    }
}

/// Outcome of a completed multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedUpload {
    /// Object key that now exists.
    pub key: ObjectKey,
    /// Number of parts assembled.
    pub part_count: usize,
    /// Bytes uploaded.
    pub bytes: u64,
}

/// Upload state machine.
#[derive(Debug)]
pub enum UploadState {
    /// Requesting a session from the store.
    Initiating,
    /// Uploading the next chunk as a part.
    Uploading(UploadSession),
    /// Every chunk uploaded, finalizing the object.
    Completing(UploadSession),
    /// Cancelling the session after `cause`.
    Aborting {
        /// Session being cancelled.
        session: UploadSession,
        /// Error that triggered the abort.
        cause: StorageError,
    },
    /// Object assembled.
    Done(CompletedUpload),
    /// Upload failed with this error.
    Failed(StorageError),
}

impl UploadState {
    /// Whether the state machine has stopped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }
}

/// Drives one file through the multipart protocol.
pub struct MultipartUpload<'a, C, R> {
    client: &'a C,
    key: ObjectKey,
    content_type: Option<String>,
    chunks: ChunkReader<R>,
}

impl<'a, C, R> MultipartUpload<'a, C, R>
where
    C: ObjectStoreClient,
    R: AsyncRead + Unpin + Send,
{
    /// Prepare an upload of `chunks` to `key`.
    pub fn new(
        client: &'a C,
        key: ObjectKey,
        content_type: Option<String>,
        chunks: ChunkReader<R>,
    ) -> Self {
        Self {
            client,
            key,
            content_type,
            chunks,
        }
    }

    /// Run the state machine until it stops.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the upload. Abort failures are logged
    /// and never replace it.
    pub async fn run(mut self) -> Result<CompletedUpload, StorageError> {
        let mut state = UploadState::Initiating;
        loop {
            state = self.step(state).await;
            match state {
                UploadState::Done(completed) => return Ok(completed),
                UploadState::Failed(err) => return Err(err),
                _ => {}
            }
        }
    }

    /// Perform one transition. Terminal states are returned unchanged.
    pub async fn step(&mut self, state: UploadState) -> UploadState {
        match state {
            UploadState::Initiating => self.initiate().await,
            UploadState::Uploading(session) => self.upload_next_part(session).await,
            UploadState::Completing(session) => self.complete(session).await,
            UploadState::Aborting { session, cause } => Self::abort(self.client, session, cause).await,
            terminal @ (UploadState::Done(_) | UploadState::Failed(_)) => terminal,
        }
    }

    async fn initiate(&self) -> UploadState {
        match self
            .client
            .create_multipart_upload(&self.key, self.content_type.as_deref())
            .await
        {
            Ok(Some(upload_id)) if !upload_id.is_empty() => {
                info!(key = %self.key, upload_id = %upload_id, "Multipart upload initiated");
                UploadState::Uploading(UploadSession::new(upload_id, self.key.clone()))
            }
            Ok(_) => UploadState::Failed(StorageError::initiation_failed(
                self.key.as_str(),
                "store returned no upload id",
            )),
            Err(e) => UploadState::Failed(e),
        }
    }

    async fn upload_next_part(&mut self, mut session: UploadSession) -> UploadState {
        let chunk = match self.chunks.next_chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return UploadState::Completing(session),
            Err(cause) => return UploadState::Aborting { session, cause },
        };

        let part_number = session.next_part_number();
        let len = chunk.len();
        match self
            .client
            .upload_part(&session.key, &session.upload_id, part_number, chunk)
            .await
        {
            Ok(Some(etag)) => {
                debug!(key = %session.key, part_number, bytes = len, "Uploaded part");
                session.parts.push(PartRecord { part_number, etag });
                UploadState::Uploading(session)
            }
            Ok(None) => UploadState::Aborting {
                session,
                cause: StorageError::part_upload_failed(part_number, "store returned no etag"),
            },
            Err(cause) => UploadState::Aborting { session, cause },
        }
    }

    async fn complete(&self, session: UploadSession) -> UploadState {
        if session.parts.is_empty() {
            return UploadState::Aborting {
                session,
                cause: StorageError::invalid_argument("source produced no data to upload"),
            };
        }

        match self
            .client
            .complete_multipart_upload(&session.key, &session.upload_id, &session.parts)
            .await
        {
            Ok(()) => {
                let completed = CompletedUpload {
                    key: session.key,
                    part_count: session.parts.len(),
                    bytes: self.chunks.bytes_read(),
                };
                info!(
                    key = %completed.key,
                    parts = completed.part_count,
                    bytes = completed.bytes,
                    "Multipart upload completed"
                );
                UploadState::Done(completed)
            }
            Err(cause) => UploadState::Aborting { session, cause },
        }
    }

    async fn abort(client: &C, session: UploadSession, cause: StorageError) -> UploadState {
        warn!(
            key = %session.key,
            upload_id = %session.upload_id,
            error = %cause,
            "Aborting multipart upload"
        );
        if let Err(e) = client
            .abort_multipart_upload(&session.key, &session.upload_id)
            .await
        {
            warn!(
                key = %session.key,
                upload_id = %session.upload_id,
                error = %e,
                "Failed to abort multipart upload, incomplete session left in bucket"
            );
        }
        UploadState::Failed(cause)
    }
}
