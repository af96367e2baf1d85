use anyhow::{Context, Result, bail};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::model::SortOrder;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Path of the local SQLite store.
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub comments: CommentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// When set, commands talk to this server instead of the local store.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        let secs = i64::try_from(self.stale_after_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs.min(i64::MAX / 1_000))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentsConfig {
    #[serde(default)]
    pub default_sort: SortOrder,
}

/// Command-line and environment inputs that override the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub json: bool,
    pub format: Option<String>,
    pub database: Option<PathBuf>,
    pub remote: Option<String>,
}

impl Overrides {
    /// Fill unset fields from `FORMAT`, `TASKBOARD_DB` and `TASKBOARD_URL`.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        self.format = self.format.or_else(|| env::var("FORMAT").ok());
        self.database = self
            .database
            .or_else(|| env::var_os("TASKBOARD_DB").map(PathBuf::from));
        self.remote = self
            .remote
            .or_else(|| env::var("TASKBOARD_URL").ok())
            .filter(|url| !url.trim().is_empty());
        self
    }
}

#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub user: ClientConfig,
    pub resolved_output: String,
    pub database: PathBuf,
    pub server_url: Option<String>,
}

#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskboard/config.toml"))
}

pub fn load_user_config() -> Result<ClientConfig> {
    match user_config_path() {
        Some(path) => load_config_from(&path),
        None => Ok(ClientConfig::default()),
    }
}

pub fn load_config_from(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ClientConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

#[must_use]
pub fn default_database_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from(".taskboard/taskboard.db"),
        |dir| dir.join("taskboard/taskboard.db"),
    )
}

pub fn resolve_config(overrides: Overrides) -> Result<EffectiveConfig> {
    let user = load_user_config()?;
    resolve_with(user, overrides.with_env())
}

/// Combine a loaded config with already-collected overrides.
pub fn resolve_with(user: ClientConfig, overrides: Overrides) -> Result<EffectiveConfig> {
    let resolved_output = resolve_output(
        overrides.json,
        overrides.format.as_deref(),
        user.output.as_deref(),
    )?;
    let database = overrides
        .database
        .or_else(|| user.database.clone())
        .unwrap_or_else(default_database_path);
    let server_url = overrides.remote.or_else(|| user.server.base_url.clone());

    Ok(EffectiveConfig {
        user,
        resolved_output,
        database,
        server_url,
    })
}

fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "plain" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

fn resolve_output(
    cli_json: bool,
    format: Option<&str>,
    user_output: Option<&str>,
) -> Result<String> {
    if cli_json {
        return Ok("json".to_string());
    }

    if let Some(raw) = format {
        let Some(mode) = normalize_output_mode(raw) else {
            bail!("unknown output format '{raw}' (expected pretty, text or json)");
        };
        return Ok(mode.to_string());
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return Ok(mode.to_string());
    }

    if std::io::stdout().is_terminal() {
        Ok("pretty".to_string())
    } else {
        Ok("text".to_string())
    }
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_stale_after_secs() -> u64 {
    300
}
