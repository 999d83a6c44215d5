use anyhow::{Context, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, path::PathBuf, sync::Arc};
use tracing::Dispatch;

use crate::{
    directory::MunicipalityDirectory,
    error::{Error, Result},
    fetch::Transport,
};

/// Environment variable consulted when no API key is configured explicitly.
pub const ENV_API_KEY: &str = "AEMET_API_KEY";

/// Options for [`crate::AemetClient`].
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Falls back to `AEMET_API_KEY` when unset.
    pub api_key: Option<String>,
    /// HTTP client used instead of the default one with a 30 second timeout.
    pub http_client: Option<reqwest::Client>,
    /// Replaces the HTTP layer entirely; takes precedence over `http_client`.
    pub transport: Option<Arc<dyn Transport>>,
    /// Receives the client's log events instead of the global subscriber.
    pub logger: Option<Dispatch>,
    /// Lookup table used for name resolution instead of the embedded one.
    pub directory: Option<Arc<MunicipalityDirectory>>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_logger(mut self, logger: impl Into<Dispatch>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    pub fn with_directory(mut self, directory: Arc<MunicipalityDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// The configured key, or the `AEMET_API_KEY` environment variable.
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_api_key(self.api_key.as_deref(), std::env::var(ENV_API_KEY).ok())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("http_client", &self.http_client)
            .field("transport", &self.transport)
            .field("logger", &self.logger.is_some())
            .field("directory", &self.directory.as_ref().map(|d| d.len()))
            .finish()
    }
}

fn resolve_api_key(explicit: Option<&str>, from_env: Option<String>) -> Result<String> {
    explicit
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_owned)
        .or_else(|| from_env.map(|k| k.trim().to_owned()).filter(|k| !k.is_empty()))
        .ok_or_else(|| {
            Error::Config(format!(
                "an AEMET API key is required (set it in the client config or the {ENV_API_KEY} environment variable)"
            ))
        })
}

/// CLI settings stored on disk.
///
/// Example TOML:
/// api_key = "..."
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
}

impl Settings {
    /// Load settings from disk, or return empty defaults if none were saved yet.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            // First run: nothing configured.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    /// Write settings, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> anyhow::Result<PathBuf> {
        let dirs = ProjectDirs::from("es", "aemet", "aemet-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = Some(api_key.into());
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig { api_key: self.api_key.clone(), ..ClientConfig::default() }
    }
}
