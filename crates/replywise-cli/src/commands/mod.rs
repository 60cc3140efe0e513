//! CLI command implementations for `replywise`.
//!
//! Each subcommand is implemented in its own module:
//!
//! - [`send`] -- Dispatch a prompt through the full pipeline.
//! - [`check`] -- Endpoint and credential probe.
//! - [`providers`] -- Resolved provider table.
//! - [`history_cmd`] -- Recorded requests.

pub mod check;
pub mod history_cmd;
pub mod providers;
pub mod send;

use std::path::{Path, PathBuf};

use replywise_types::StoredConfig;

/// Environment variable that overrides config discovery.
pub const CONFIG_ENV: &str = "REPLYWISE_CONFIG";

/// Directory under the home directory holding config and history.
const DATA_DIR: &str = ".replywise";

/// Load configuration from the given path override or via auto-discovery.
///
/// If `config_override` is provided, the file must exist. Otherwise the
/// discovery chain is:
/// 1. `REPLYWISE_CONFIG` env var
/// 2. `~/.replywise/config.json`
///
/// Returns a default `StoredConfig` if no config file is found.
pub async fn load_config(config_override: Option<&str>) -> anyhow::Result<StoredConfig> {
    let path = match config_override {
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                anyhow::bail!("config file not found: {path_str}");
            }
            path
        }
        None => match discover_config_path() {
            Some(path) => path,
            None => {
                tracing::debug!("no config file found, using defaults");
                return Ok(StoredConfig::default());
            }
        },
    };
    read_config(&path).await
}

async fn read_config(path: &Path) -> anyhow::Result<StoredConfig> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
    let config: StoredConfig = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config {}: {e}", path.display()))?;
    tracing::debug!(path = %path.display(), provider = %config.api_choice, "config loaded");
    Ok(config)
}

/// The config file that discovery would load, if one exists.
pub fn discover_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(CONFIG_ENV)
        && !raw.trim().is_empty()
    {
        let path = PathBuf::from(raw.trim());
        return path.is_file().then_some(path);
    }
    let path = data_dir()?.join("config.json");
    path.is_file().then_some(path)
}

/// `~/.replywise`, if the home directory is known.
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DATA_DIR))
}

/// Where request history is persisted.
pub fn history_path() -> anyhow::Result<PathBuf> {
    data_dir()
        .map(|dir| dir.join("history.json"))
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory for history"))
}
