//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path under which stored files are redirected to the CDN.
    #[serde(default = "default_serve_path")]
    pub serve_path: String,
    /// Maximum accepted upload body in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            serve_path: default_serve_path(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_serve_path() -> String {
    "/content".to_string()
}

fn default_max_upload_bytes() -> usize {
    1024 * 1024 * 1024 // 1 GiB
}

/// Raw object storage settings as read from files and the environment.
///
/// Every field is optional here so that a missing value can be reported by
/// name when the storage layer validates it, instead of failing inside serde.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSettings {
    /// Bucket name.
    pub bucket: Option<String>,
    /// Storage root prefix inside the bucket (e.g. `content/images`).
    pub storage_path: Option<String>,
    /// Optional per-site namespace prepended to every key.
    pub tenant_prefix: Option<String>,
    /// Public base URL objects are served from.
    pub cdn_url: Option<String>,
    /// Files of at least this many bytes use multipart upload.
    pub multipart_upload_threshold: Option<u64>,
    /// Size of every multipart chunk except the last.
    pub multipart_chunk_size: Option<u64>,
    /// Region passed to the S3 client.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    pub endpoint: Option<String>,
    /// Static access key ID.
    pub access_key_id: Option<String>,
    /// Static secret access key.
    pub secret_access_key: Option<String>,
    /// Use path-style addressing (`endpoint/bucket/key`).
    #[serde(default)]
    pub force_path_style: bool,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("STOWAGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
