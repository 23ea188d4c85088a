//! Core storage logic for Stowage.
//!
//! This crate contains the S3 storage adapter with ZERO web dependencies.
//!
//! # Modules
//!
//! - `storage` - Object keys, chunked file reading, the multipart upload
//!   engine and the S3 transport

pub mod storage;
