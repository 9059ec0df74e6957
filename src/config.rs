use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};

use crate::services::retry::RetrySettings;
use crate::services::spotify::client::SpotifyApiCredentials;
use crate::services::sync::SyncSettings;

/// Channels polled when the config file names none.
const DEFAULT_CHANNELS: &[&str] = &[
    "deepspaceone",
    "dronezone",
    "fluid",
    "groovesalad",
    "gsclassic",
    "lush",
    "sonicuniverse",
    "spacestation",
    "suburbsofgoa",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the match cache lives. Defaults to the user data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    mapping_file: Option<String>,
    pub channels: Vec<String>,
    pub search_delay_ms: u64,
    pub min_sleep_minutes: u64,
    pub max_sleep_minutes: u64,
    pub playlist_public: bool,
    pub retry: RetryConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotify: Option<SpotifyConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per channel, the first one included
    pub max_attempts: usize,
    pub min_delay_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mapping_file: None,
            channels: DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
            search_delay_ms: 250,
            min_sleep_minutes: 5,
            max_sleep_minutes: 20,
            playlist_public: true,
            retry: RetryConfig::default(),
            spotify: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay_secs: 2,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err(format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err(format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("somafy").join("config.toml"))
    }

    /// Load the default config file, or the built-in defaults if there is none
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the defaults to the default config path unless a file is already there
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or(eyre!("No config directory on this system"))?;
        Self::write_default(&path)?;
        Ok(path)
    }

    fn write_default(path: &Path) -> Result<()> {
        if path.exists() {
            tracing::info!(path = %path.display(), "Config file already exists");
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err(format!("Failed to create directory {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(path, contents)
            .wrap_err(format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(eyre!("No channels configured"));
        }
        if self.min_sleep_minutes > self.max_sleep_minutes {
            return Err(eyre!(
                "min_sleep_minutes ({}) is greater than max_sleep_minutes ({})",
                self.min_sleep_minutes,
                self.max_sleep_minutes
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(eyre!("retry.max_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Expand ~ to home directory
    fn expand_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    /// Get expanded match cache path
    pub fn mapping_path(&self) -> PathBuf {
        match &self.mapping_file {
            Some(path) => self.expand_path(path),
            None => dirs::data_dir()
                .map(|dir| dir.join("somafy"))
                .unwrap_or_default()
                .join("mapping.json"),
        }
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            channels: self.channels.clone(),
            mapping_path: self.mapping_path(),
            search_delay: Duration::from_millis(self.search_delay_ms),
            retry: RetrySettings {
                max_retries: self.retry.max_attempts.saturating_sub(1),
                min_delay: Duration::from_secs(self.retry.min_delay_secs),
            },
        }
    }

    /// Client id and secret for the authorization flow, which has no refresh token yet.
    pub fn spotify_app(
        &self,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Result<(String, String)> {
        let file = self.spotify.clone().unwrap_or_default();
        let client_id = client_id
            .or(file.client_id)
            .ok_or(eyre!("Missing Spotify credentials: SPOTIFY_CLIENT_ID"))?;
        let client_secret = client_secret
            .or(file.client_secret)
            .ok_or(eyre!("Missing Spotify credentials: SPOTIFY_CLIENT_SECRET"))?;
        Ok((client_id, client_secret))
    }

    /// Combine command line / environment values with the `[spotify]` table;
    /// the former win.
    pub fn spotify_credentials(
        &self,
        client_id: Option<String>,
        client_secret: Option<String>,
        refresh_token: Option<String>,
    ) -> Result<SpotifyApiCredentials> {
        let file = self.spotify.clone().unwrap_or_default();
        let client_id = client_id.or(file.client_id);
        let client_secret = client_secret.or(file.client_secret);
        let refresh_token = refresh_token.or(file.refresh_token);

        match (client_id, client_secret, refresh_token) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Ok(
                SpotifyApiCredentials::new(client_id, client_secret, refresh_token),
            ),
            (client_id, client_secret, refresh_token) => {
                let missing: Vec<&str> = [
                    ("SPOTIFY_CLIENT_ID", client_id.is_none()),
                    ("SPOTIFY_CLIENT_SECRET", client_secret.is_none()),
                    ("SPOTIFY_REFRESH_TOKEN", refresh_token.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, is_missing)| is_missing.then_some(name))
                .collect();
                Err(eyre!(
                    "Missing Spotify credentials: {}. Set them in the environment or the [spotify] \
                     table of the config file; run `somafy authorize` to obtain a refresh token",
                    missing.join(", ")
                ))
            }
        }
    }
}
