//! Application configuration for sitemark.
//!
//! User config lives at `~/.sitemark/sitemark.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SitemarkError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitemark.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitemark";

/// Browser-like User-Agent sent with page requests.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// User-Agent sent with sitemap requests.
pub const SITEMAP_USER_AGENT: &str = concat!("sitemark/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Config structs (matching sitemark.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Job defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory generated documents are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Maximum simultaneous page fetches per job.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// User-Agent for page requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_output_dir() -> String {
    "downloads".into()
}
fn default_concurrency() -> usize {
    5
}
fn default_request_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    BROWSER_USER_AGENT.into()
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    9090
}

// ---------------------------------------------------------------------------
// Job config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for one crawl job, passed explicitly into the pipeline.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Directory the generated document is written to.
    pub output_dir: PathBuf,
    /// Maximum simultaneous page fetches.
    pub concurrency: usize,
    /// Timeout applied to every individual request.
    pub request_timeout: Duration,
    /// User-Agent for page requests.
    pub user_agent: String,
    /// User-Agent for the sitemap request.
    pub sitemap_user_agent: String,
    /// Route prefix the generated file is served under.
    pub download_route: String,
}

impl From<&AppConfig> for JobConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.defaults.output_dir),
            concurrency: config.defaults.concurrency.max(1),
            request_timeout: Duration::from_secs(config.defaults.request_timeout_secs),
            user_agent: config.defaults.user_agent.clone(),
            sitemap_user_agent: SITEMAP_USER_AGENT.into(),
            download_route: "/download".into(),
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitemark/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SitemarkError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitemark/sitemark.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| SitemarkError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SitemarkError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SitemarkError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| SitemarkError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SitemarkError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
