//! Server configuration: defaults, TOML file, then `TGMOCK__*` env vars.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "tgmock";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 9000;

/// Default record lifetime in seconds.
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 60;

/// Where records are kept. Memory is the only backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageKind {
    #[default]
    #[serde(rename = "RAM", alias = "ram")]
    Ram,
}

/// Settings accepted by [`TelegramServer`](crate::TelegramServer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// `0` picks a free port.
    pub port: u16,
    pub storage: StorageKind,
    /// Record time-to-live in seconds; also the eviction sweep period.
    #[serde(alias = "storeTimeout")]
    pub store_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            storage: StorageKind::Ram,
            store_timeout: DEFAULT_STORE_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    /// Record time-to-live.
    pub fn store_ttl(&self) -> Duration {
        Duration::from_secs(self.store_timeout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("server.host must not be empty");
        }
        if self.store_timeout == 0 {
            bail!("server.store_timeout must be at least one second");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Everything read from the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
}

/// Layer defaults, the TOML file at `path` (optional) and environment
/// variables named `<prefix>__SECTION__KEY`.
pub fn load_config(path: &Path, env_prefix: &str) -> Result<AppConfig> {
    let defaults = ServerConfig::default();
    let built = Config::builder()
        .set_default("logging.level", "info")?
        .set_default("server.host", defaults.host)?
        .set_default("server.port", i64::from(defaults.port))?
        .set_default("server.storage", "RAM")?
        .set_default("server.store_timeout", defaults.store_timeout as i64)?
        .add_source(File::from(path).format(FileFormat::Toml).required(false))
        .add_source(Environment::with_prefix(env_prefix).separator("__"))
        .build()
        .with_context(|| format!("reading configuration from {}", path.display()))?;

    let config: AppConfig = built
        .try_deserialize()
        .context("parsing configuration")?;
    config.server.validate()?;
    Ok(config)
}

/// Write the default configuration to `path`, creating parent directories.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = default_config_header(path);
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

fn default_config_header(path: &Path) -> String {
    let mut buffer = String::new();
    buffer.push_str("# Configuration for ");
    buffer.push_str(APP_NAME);
    buffer.push('\n');
    buffer.push_str("# File: ");
    buffer.push_str(&path.display().to_string());
    buffer.push('\n');
    buffer.push('\n');
    buffer
}

/// Config file location, honoring an explicit override (file or directory).
pub fn resolve_config_path(override_path: Option<PathBuf>) -> Result<PathBuf> {
    let config_file = match override_path {
        Some(path) => {
            let expanded = expand_path(path)?;
            if expanded.is_dir() {
                expanded.join("config.toml")
            } else {
                expanded
            }
        }
        None => default_config_dir()?.join("config.toml"),
    };

    if config_file.parent().is_none() {
        return Err(anyhow!("invalid config file path: {config_file:?}"));
    }
    Ok(config_file)
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    match path.to_str() {
        Some(text) => {
            let expanded = shellexpand::full(text).context("expanding path")?;
            Ok(PathBuf::from(expanded.to_string()))
        }
        None => Ok(path),
    }
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(dir) = dirs::config_dir() {
        return Ok(dir.join(APP_NAME));
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

/// Environment variable prefix derived from the app name.
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
