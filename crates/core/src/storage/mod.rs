//! S3 file storage with a multipart upload engine.
//!
//! Files are written to an S3-compatible bucket and served from a CDN. Small
//! files go up in a single request; files at or above the configured
//! threshold are streamed from disk in fixed-size parts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ S3Storage (FileStorage)                                          │
//! │   save ─► KeyBuilder ─► size < threshold ─► put_object           │
//! │                      └► size ≥ threshold ─► ChunkReader          │
//! │                                              └► MultipartUpload  │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ ObjectStoreClient (S3Client via aws-sdk-s3)                      │
//! │ put / head / delete / create / upload_part / complete / abort    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A multipart upload whose abort also fails leaves an incomplete session
//! in the bucket. Nothing here sweeps those; configure a bucket lifecycle
//! rule for incomplete multipart uploads.

mod chunk;
mod client;
mod config;
mod error;
mod key;
mod multipart;
mod naming;
mod s3;
mod service;

pub use chunk::ChunkReader;
pub use client::{ObjectMeta, ObjectStoreClient};
pub use config::{MIN_PART_SIZE, StorageConfig, TransportOptions};
pub use error::StorageError;
pub use key::{KeyBuilder, ObjectKey};
pub use multipart::{CompletedUpload, MultipartUpload, PartRecord, UploadSession, UploadState};
pub use naming::{dated_dir, default_target_dir, sanitize_file_name, unique_file_name};
pub use s3::S3Client;
pub use service::{FileStorage, S3Storage, UploadedFile};
