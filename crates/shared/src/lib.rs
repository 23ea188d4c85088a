//! Shared errors and configuration for Stowage.
//!
//! This crate provides common types used across all other crates:
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;

pub use config::{AppConfig, ServerConfig, StorageSettings};
pub use error::{AppError, AppResult};
