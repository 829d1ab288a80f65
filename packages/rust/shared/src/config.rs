//! Application configuration for profsite.
//!
//! User config lives at `~/.profsite/profsite.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProfsiteError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "profsite.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".profsite";

// ---------------------------------------------------------------------------
// Config structs (matching profsite.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site paths.
    #[serde(default)]
    pub site: SiteConfig,

    /// Zotero Web API settings.
    #[serde(default)]
    pub zotero: ZoteroConfig,

    /// External document converter.
    #[serde(default)]
    pub pandoc: PandocConfig,

    /// OpenCage geocoding settings.
    #[serde(default)]
    pub opencage: OpenCageConfig,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Root directory for uploaded and generated files (`bibs/`, `citestyles/`).
    #[serde(default = "default_media_root")]
    pub media_root: String,

    /// Path of the libSQL database file.
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            database: default_database(),
        }
    }
}

impl SiteConfig {
    /// Media root with a leading `~/` expanded to the home directory.
    pub fn media_root_path(&self) -> PathBuf {
        expand_home(&self.media_root)
    }

    /// Database path with a leading `~/` expanded to the home directory.
    pub fn database_path(&self) -> PathBuf {
        expand_home(&self.database)
    }
}

fn default_media_root() -> String {
    "~/profsite/media".into()
}
fn default_database() -> String {
    "~/profsite/profsite.db".into()
}

/// `[zotero]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoteroConfig {
    /// Base URL of the Zotero Web API.
    #[serde(default = "default_zotero_api_base")]
    pub api_base: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_zotero_key_env")]
    pub api_key_env: String,

    /// Items requested per page while fetching a whole library.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ZoteroConfig {
    fn default() -> Self {
        Self {
            api_base: default_zotero_api_base(),
            api_key_env: default_zotero_key_env(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_zotero_api_base() -> String {
    "https://api.zotero.org".into()
}
fn default_zotero_key_env() -> String {
    "ZOTERO_API_KEY".into()
}
fn default_page_size() -> u32 {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[pandoc]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PandocConfig {
    /// Converter executable, looked up on `PATH` when not absolute.
    #[serde(default = "default_pandoc_binary")]
    pub binary: String,
}

impl Default for PandocConfig {
    fn default() -> Self {
        Self {
            binary: default_pandoc_binary(),
        }
    }
}

fn default_pandoc_binary() -> String {
    "pandoc".into()
}

/// `[opencage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenCageConfig {
    /// Base URL of the OpenCage API.
    #[serde(default = "default_opencage_api_base")]
    pub api_base: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_opencage_key_env")]
    pub api_key_env: String,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenCageConfig {
    fn default() -> Self {
        Self {
            api_base: default_opencage_api_base(),
            api_key_env: default_opencage_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_opencage_api_base() -> String {
    "https://api.opencagedata.com".into()
}
fn default_opencage_key_env() -> String {
    "OPENCAGE_API_KEY".into()
}

// ---------------------------------------------------------------------------
// Sync config (runtime, resolved from config + environment)
// ---------------------------------------------------------------------------

/// Runtime settings for the bibliography syncer, with the API key resolved.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the Zotero Web API.
    pub api_base: String,
    /// Static API key.
    pub api_key: String,
    /// Items per page.
    pub page_size: u32,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Media root; bibliography files land in `<media_root>/bibs/`.
    pub media_root: PathBuf,
}

impl SyncConfig {
    /// Resolve the runtime sync settings, reading the API key from the environment.
    pub fn from_app(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            api_base: validate_api_base(&config.zotero.api_base, "zotero")?,
            api_key: resolve_api_key(&config.zotero.api_key_env, "Zotero")?,
            page_size: config.zotero.page_size,
            timeout_secs: config.zotero.timeout_secs,
            media_root: config.site.media_root_path(),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.profsite/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProfsiteError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.profsite/profsite.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ProfsiteError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ProfsiteError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProfsiteError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProfsiteError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProfsiteError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a non-empty API key from the env var named `var_name`.
pub fn resolve_api_key(var_name: &str, service: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ProfsiteError::config(format!(
            "{service} API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that `raw` is an absolute http(s) URL; returns it without a trailing slash.
pub fn validate_api_base(raw: &str, section: &str) -> Result<String> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ProfsiteError::config(format!("[{section}] api_base '{raw}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ProfsiteError::config(format!(
            "[{section}] api_base '{raw}' must use http or https"
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(raw),
        },
        None => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("media_root"));
        assert!(toml_str.contains("ZOTERO_API_KEY"));
        assert!(toml_str.contains("OPENCAGE_API_KEY"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[site]
media_root = "/srv/site/media"

[zotero]
page_size = 25
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.site.media_root_path(), PathBuf::from("/srv/site/media"));
        assert_eq!(config.zotero.page_size, 25);
        assert_eq!(config.zotero.api_base, "https://api.zotero.org");
        assert_eq!(config.pandoc.binary, "pandoc");
    }

    #[test]
    fn api_base_must_be_http_url() {
        assert_eq!(
            validate_api_base("https://api.zotero.org/", "zotero").unwrap(),
            "https://api.zotero.org"
        );
        assert!(validate_api_base("api.zotero.org", "zotero").is_err());
        let err = validate_api_base("ftp://example.org", "opencage").unwrap_err();
        assert!(err.to_string().contains("[opencage]"));
    }

    #[test]
    fn home_prefix_is_expanded() {
        let site = SiteConfig::default();
        let media = site.media_root_path();
        assert!(!media.to_string_lossy().starts_with('~'));
        assert!(media.ends_with("profsite/media"));
    }

    #[test]
    fn missing_api_key_is_config_error() {
        // Use a unique env var name to avoid interfering with other tests
        let result = resolve_api_key("PROFSITE_TEST_NONEXISTENT_KEY_12345", "Zotero");
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("Zotero API key not found"));
        assert!(msg.contains("PROFSITE_TEST_NONEXISTENT_KEY_12345"));
    }

    #[test]
    fn sync_config_requires_key() {
        let mut config = AppConfig::default();
        config.zotero.api_key_env = "PROFSITE_TEST_NONEXISTENT_KEY_67890".into();
        assert!(SyncConfig::from_app(&config).is_err());
    }
}
