//! Configuration loading for the relay.
//!
//! Layered precedence: built-in defaults, config file
//! (~/.config/event-relay/config.toml), environment variables (RELAY_*),
//! then CLI flags applied by the caller.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::RelayError;

/// Source search store connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    /// Search store host.
    #[serde(default = "default_source_host")]
    pub host: String,

    /// Search store port.
    #[serde(default = "default_source_port")]
    pub port: u16,

    /// Basic auth username, if the store requires it.
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password.
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Use https when connecting.
    #[serde(default)]
    pub use_tls: bool,

    /// Verify TLS certificates. Off by default because the source store
    /// commonly runs with self-signed certificates inside the perimeter.
    #[serde(default)]
    pub verify_certs: bool,

    /// Collection (index) to read records from.
    #[serde(default = "default_source_index")]
    pub index: String,

    /// Page size for search requests.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl SourceSettings {
    /// Complete base URL for the search store.
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            host: default_source_host(),
            port: default_source_port(),
            username: None,
            password: None,
            use_tls: false,
            verify_certs: false,
            index: default_source_index(),
            page_size: default_page_size(),
        }
    }
}

/// Destination document store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DocStoreSettings {
    /// Document store base URL.
    #[serde(default = "default_docstore_url")]
    pub base_url: String,

    /// Bearer token for the document store API.
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Collection persisted event records land in.
    #[serde(default = "default_events_collection")]
    pub events_collection: String,

    /// Collection holding notification subscribers.
    #[serde(default = "default_responders_collection")]
    pub responders_collection: String,

    /// Collection holding the statistics snapshot.
    #[serde(default = "default_stats_collection")]
    pub stats_collection: String,
}

impl Default for DocStoreSettings {
    fn default() -> Self {
        Self {
            base_url: default_docstore_url(),
            api_key: None,
            events_collection: default_events_collection(),
            responders_collection: default_responders_collection(),
            stats_collection: default_stats_collection(),
        }
    }
}

/// Blob storage settings for annotated images.
#[derive(Debug, Clone, Deserialize)]
pub struct BlobSettings {
    /// Blob storage base URL.
    #[serde(default = "default_blob_url")]
    pub base_url: String,

    /// Bucket name. Uploads fail when left empty.
    #[serde(default)]
    pub bucket: String,

    /// Path prefix under which images are stored.
    #[serde(default = "default_blob_prefix")]
    pub prefix: String,
}

impl Default for BlobSettings {
    fn default() -> Self {
        Self {
            base_url: default_blob_url(),
            bucket: String::new(),
            prefix: default_blob_prefix(),
        }
    }
}

/// Image API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSettings {
    /// Authorization endpoint returning a bearer token.
    #[serde(default = "default_image_auth_url")]
    pub auth_url: String,

    /// Username for the authorization endpoint.
    #[serde(default = "default_image_username")]
    pub username: String,

    /// Password for the authorization endpoint.
    #[serde(default = "default_image_password")]
    pub password: SecretString,

    /// Base URL images are fetched from.
    #[serde(default = "default_image_base_url")]
    pub base_url: String,

    /// Accept self-signed certificates from the image API.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            auth_url: default_image_auth_url(),
            username: default_image_username(),
            password: default_image_password(),
            base_url: default_image_base_url(),
            accept_invalid_certs: true,
        }
    }
}

/// Push notification channel settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PushSettings {
    /// Push endpoint messages are posted to.
    #[serde(default = "default_push_endpoint")]
    pub endpoint: String,

    /// Bearer token for the push endpoint.
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Maximum tokens per send sub-batch.
    #[serde(default = "default_push_batch_size")]
    pub batch_size: usize,

    /// Pause between sub-batches, in milliseconds.
    #[serde(default = "default_push_pause_ms")]
    pub pause_ms: u64,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            endpoint: default_push_endpoint(),
            api_key: None,
            batch_size: default_push_batch_size(),
            pause_ms: default_push_pause_ms(),
        }
    }
}

/// Pipeline pacing and batching settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// Sleep between continuous-mode cycles, in seconds.
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,

    /// Records per commit batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Recent-window lookback for single-shot runs, in minutes.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,

    /// Pause after each committed batch, in milliseconds.
    #[serde(default = "default_commit_pause_ms")]
    pub commit_pause_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            polling_interval_secs: default_polling_interval(),
            batch_size: default_batch_size(),
            window_minutes: default_window_minutes(),
            commit_pause_ms: default_commit_pause_ms(),
        }
    }
}

/// Main application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Source search store.
    #[serde(default)]
    pub source: SourceSettings,

    /// Destination document store.
    #[serde(default)]
    pub docstore: DocStoreSettings,

    /// Blob storage for annotated images.
    #[serde(default)]
    pub blob: BlobSettings,

    /// Image API.
    #[serde(default)]
    pub image: ImageSettings,

    /// Push channel.
    #[serde(default)]
    pub push: PushSettings,

    /// Pipeline pacing and batching.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_source_host() -> String {
    "localhost".to_string()
}

fn default_source_port() -> u16 {
    9200
}

fn default_source_index() -> String {
    "security-events".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_docstore_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_events_collection() -> String {
    "events".to_string()
}

fn default_responders_collection() -> String {
    "responders".to_string()
}

fn default_stats_collection() -> String {
    "event_statistics".to_string()
}

fn default_blob_url() -> String {
    "http://localhost:4443".to_string()
}

fn default_blob_prefix() -> String {
    "events".to_string()
}

fn default_image_auth_url() -> String {
    "https://localhost/incident-response/authorize".to_string()
}

fn default_image_username() -> String {
    "admin".to_string()
}

fn default_image_password() -> SecretString {
    SecretString::from(String::new())
}

fn default_image_base_url() -> String {
    "https://localhost/incident-response/image/main".to_string()
}

fn default_push_endpoint() -> String {
    "http://localhost:8087/send".to_string()
}

fn default_push_batch_size() -> usize {
    500
}

fn default_push_pause_ms() -> u64 {
    100
}

fn default_polling_interval() -> u64 {
    30
}

fn default_batch_size() -> usize {
    50
}

fn default_window_minutes() -> i64 {
    5
}

fn default_commit_pause_ms() -> u64 {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: SourceSettings::default(),
            docstore: DocStoreSettings::default(),
            blob: BlobSettings::default(),
            image: ImageSettings::default(),
            push: PushSettings::default(),
            pipeline: PipelineSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/event-relay/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (RELAY_*, nested keys joined with `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, RelayError> {
        let config_dir = ProjectDirs::from("", "", "event-relay")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: RELAY_SOURCE__HOST, RELAY_PIPELINE__BATCH_SIZE, etc.
        builder = builder.add_source(
            Environment::with_prefix("RELAY")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| RelayError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| RelayError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.pipeline.batch_size == 0 {
            return Err(RelayError::Config("pipeline.batch_size must be > 0".into()));
        }
        if self.pipeline.polling_interval_secs == 0 {
            return Err(RelayError::Config(
                "pipeline.polling_interval_secs must be > 0".into(),
            ));
        }
        if self.pipeline.window_minutes <= 0 {
            return Err(RelayError::Config(
                "pipeline.window_minutes must be > 0".into(),
            ));
        }
        if self.push.batch_size == 0 {
            return Err(RelayError::Config("push.batch_size must be > 0".into()));
        }
        if self.source.page_size == 0 {
            return Err(RelayError::Config("source.page_size must be > 0".into()));
        }
        Ok(())
    }
}
