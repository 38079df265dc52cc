//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (KLAZZ_*)
//! 2. TOML config file (if KLAZZ_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (KLAZZ_*)
/// 2. TOML config file (if KLAZZ_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding saved pages and the response bucket.
    ///
    /// Set via KLAZZ_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the tutorial site, e.g. `https://klazz.example`.
    ///
    /// Set via KLAZZ_BASE_URL environment variable.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path prefix under which tutorial pages are served.
    ///
    /// Set via KLAZZ_ROUTE_PREFIX environment variable.
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    /// Name of the response cache bucket for this deployment.
    ///
    /// Bumping it makes every previously cached response unreachable.
    /// Set via KLAZZ_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via KLAZZ_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via KLAZZ_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via KLAZZ_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Heartbeat resync period in seconds while online. `0` disables it.
    ///
    /// Set via KLAZZ_RESYNC_INTERVAL_SECS environment variable.
    #[serde(default)]
    pub resync_interval_secs: u64,

    /// Start in the offline state instead of online.
    ///
    /// Set via KLAZZ_START_OFFLINE environment variable.
    #[serde(default)]
    pub start_offline: bool,

    /// Root of the markdown content tree (`{lang}/{track?}/{slug}.md`).
    ///
    /// Set via KLAZZ_CONTENT_DIR environment variable.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Location of the precomputed search index JSON.
    ///
    /// Set via KLAZZ_SEARCH_INDEX_PATH environment variable.
    #[serde(default = "default_search_index_path")]
    pub search_index_path: PathBuf,

    /// Number of body characters kept per search index snippet.
    ///
    /// Set via KLAZZ_SNIPPET_LEN environment variable.
    #[serde(default = "default_snippet_len")]
    pub snippet_len: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./klazz-offline.sqlite")
}

fn default_base_url() -> String {
    "http://localhost:3000".into()
}

fn default_route_prefix() -> String {
    "/language".into()
}

fn default_cache_version() -> String {
    "klazz-v1".into()
}

fn default_user_agent() -> String {
    "klazz-offline/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("./public/Note")
}

fn default_search_index_path() -> PathBuf {
    PathBuf::from("./public/search-index.json")
}

fn default_snippet_len() -> usize {
    150
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            base_url: default_base_url(),
            route_prefix: default_route_prefix(),
            cache_version: default_cache_version(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            resync_interval_secs: 0,
            start_offline: false,
            content_dir: default_content_dir(),
            search_index_path: default_search_index_path(),
            snippet_len: default_snippet_len(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Heartbeat resync period, or `None` when disabled.
    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_secs > 0).then(|| Duration::from_secs(self.resync_interval_secs))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `KLAZZ_`
    /// 2. TOML file from `KLAZZ_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("KLAZZ_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("KLAZZ_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
