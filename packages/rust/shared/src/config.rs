//! Application configuration for MasterTable.
//!
//! User config lives at `~/.mastertable/mastertable.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MasterTableError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "mastertable.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".mastertable";

/// Largest page size the versions endpoint honours.
pub const MAX_PER_PAGE: u32 = 100;

// ---------------------------------------------------------------------------
// Config structs (matching mastertable.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote catalog settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Listing traversal.
    #[serde(default)]
    pub pager: PagerSection,

    /// Detail enrichment pacing.
    #[serde(default)]
    pub enrichment: EnrichmentSection,
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the JSON API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base URL of the human-facing site, used for release links.
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent override. The API rejects anonymous agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            site_url: default_site_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: None,
        }
    }
}

impl ApiConfig {
    /// Config pointing at an arbitrary API root (mock servers, mirrors).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

fn default_base_url() -> String {
    "https://api.discogs.com".into()
}
fn default_site_url() -> String {
    "https://www.discogs.com".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[pager]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagerSection {
    /// Items requested per listing page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for PagerSection {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
        }
    }
}

fn default_per_page() -> u32 {
    MAX_PER_PAGE
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSection {
    /// Detail requests issued together per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches, in milliseconds.
    #[serde(default = "default_batch_delay")]
    pub batch_delay_ms: u64,
}

impl Default for EnrichmentSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}
fn default_batch_delay() -> u64 {
    200
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Items per listing page.
    pub per_page: u32,
    /// Concurrent detail requests per batch.
    pub batch_size: usize,
    /// Cooperative pause between batches.
    pub batch_delay: Duration,
    /// Site root used to build release links.
    pub site_url: String,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            per_page: config.pager.per_page,
            batch_size: config.enrichment.batch_size,
            batch_delay: Duration::from_millis(config.enrichment.batch_delay_ms),
            site_url: config.api.site_url.clone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl PipelineConfig {
    /// Reject values the remote API or the scheduler cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(MasterTableError::config(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}, got {}",
                self.per_page
            )));
        }
        if self.batch_size == 0 {
            return Err(MasterTableError::config("batch_size must be at least 1"));
        }
        Url::parse(&self.site_url).map_err(|e| {
            MasterTableError::config(format!("invalid site_url '{}': {e}", self.site_url))
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.mastertable/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MasterTableError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.mastertable/mastertable.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MasterTableError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        MasterTableError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MasterTableError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MasterTableError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MasterTableError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
