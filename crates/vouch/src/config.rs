//! Layered configuration for the media layer.
//!
//! Sources, later overriding earlier:
//! - Bundled defaults (include_str! from vouch.toml)
//! - `~/.config/vouch/vouch.toml`
//! - `./vouch.toml`
//! - `VOUCH_` environment variables, `__` between sections

use config::{Config, Environment, File, FileFormat};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use vouch_cache::VideoCacheConfig;
use vouch_error::{ConfigError, VouchResult};
use vouch_media::{IngestConfig, ThumbnailConfig};
use vouch_storage::RetryPolicy;

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../vouch.toml");

/// Which blob backend the store talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Objects under a local directory
    #[default]
    Filesystem,
    /// Remote object service over HTTP
    Http,
    /// Process-local map, lost on exit
    Memory,
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct StorageConfig {
    /// Backend implementation
    #[serde(default)]
    backend: BackendKind,

    /// Root directory for the filesystem backend
    #[serde(default = "default_root")]
    root: PathBuf,

    /// Base URL for the HTTP backend
    #[serde(default)]
    endpoint: Option<String>,

    /// Bearer token for the HTTP backend
    #[serde(default)]
    token: Option<String>,

    /// Key prefix for uploads and thumbnails
    #[serde(default = "default_namespace")]
    namespace: String,

    /// Prepended to keys to form public URLs
    #[serde(default = "default_public_url_prefix")]
    public_url_prefix: String,

    /// Retry behaviour for every storage call
    #[serde(default)]
    retry: RetryPolicy,
}

fn default_root() -> PathBuf {
    PathBuf::from("data/objects")
}

fn default_namespace() -> String {
    "shared/uploads".to_string()
}

fn default_public_url_prefix() -> String {
    "/media/".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            root: default_root(),
            endpoint: None,
            token: None,
            namespace: default_namespace(),
            public_url_prefix: default_public_url_prefix(),
            retry: RetryPolicy::default(),
        }
    }
}

impl StorageConfig {
    /// Ingest settings derived from this section.
    pub fn ingest(&self) -> IngestConfig {
        IngestConfig::default()
            .with_namespace(self.namespace.clone())
            .with_public_url_prefix(self.public_url_prefix.clone())
    }
}

/// Top-level media layer configuration.
///
/// # Example
///
/// ```no_run
/// use vouch::VouchConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = VouchConfig::load()?;
/// println!("cache budget: {} bytes", config.cache().max_cache_size_bytes());
/// # Ok(())
/// # }
/// ```
#[derive(
    Debug, Clone, PartialEq, Default, Serialize, Deserialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_")]
pub struct VouchConfig {
    /// Remote blob store
    #[serde(default)]
    storage: StorageConfig,

    /// Local video cache
    #[serde(default)]
    cache: VideoCacheConfig,

    /// Thumbnail extraction
    #[serde(default)]
    thumbnail: ThumbnailConfig,
}

impl VouchConfig {
    /// Load configuration from every source.
    ///
    /// User config files are optional and silently skipped if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the merged
    /// configuration is invalid.
    #[instrument]
    pub fn load() -> VouchResult<Self> {
        debug!("Loading configuration: env > current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/vouch/vouch.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("vouch").required(false))
            .add_source(
                Environment::with_prefix("VOUCH")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("thumbnail.offsets_secs")
                    .try_parsing(true),
            );

        Self::build(builder)
    }

    /// Load configuration from one file layered over the bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> VouchResult<Self> {
        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path.as_ref()));
        Self::build(builder)
    }

    /// Parse TOML text layered over the bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml(text: &str) -> VouchResult<Self> {
        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(text, FileFormat::Toml));
        Self::build(builder)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated constraint.
    pub fn validate(&self) -> VouchResult<()> {
        if *self.cache.max_cache_size_bytes() == 0 {
            return Err(ConfigError::new("cache.max_cache_size_bytes must be positive").into());
        }
        if self.storage.backend == BackendKind::Http && self.storage.endpoint.is_none() {
            return Err(ConfigError::new("storage.endpoint is required for the http backend").into());
        }
        if self.thumbnail.offsets_secs().is_empty() {
            return Err(ConfigError::new("thumbnail.offsets_secs must not be empty").into());
        }
        if self
            .thumbnail
            .offsets_secs()
            .iter()
            .any(|offset| !offset.is_finite() || *offset < 0.0)
        {
            return Err(
                ConfigError::new("thumbnail.offsets_secs must be non-negative seconds").into(),
            );
        }
        if *self.thumbnail.width() == 0 || *self.thumbnail.height() == 0 {
            return Err(ConfigError::new("thumbnail width and height must be positive").into());
        }
        Ok(())
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> VouchResult<Self> {
        let config: Self = builder
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }
}
