//! Streaming client configuration
//!
//! Read from `<config_dir>/localbook/stream.toml`; every field has a default so a
//! missing or partial file is fine.

use crate::util::errors::{LocalBookError, LocalBookResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR_NAME: &str = "localbook";
const CONFIG_FILE_NAME: &str = "stream.toml";
const BACKEND_URL_ENV: &str = "LOCALBOOK_BACKEND_URL";

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_token_flush_interval_ms() -> u64 {
    50
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_session_timeout_secs() -> u64 {
    900
}

fn default_validation_timeout_secs() -> u64 {
    10
}

fn default_max_alternatives() -> usize {
    3
}

fn default_renderer_command() -> String {
    "mmdc".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Minimum spacing between publications of buffered answer tokens.
    #[serde(default = "default_token_flush_interval_ms")]
    pub token_flush_interval_ms: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Must-complete bound for one whole session.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    #[serde(default = "default_validation_timeout_secs")]
    pub validation_timeout_secs: u64,
    #[serde(default = "default_max_alternatives")]
    pub max_alternatives: usize,
    #[serde(default = "default_renderer_command")]
    pub renderer_command: String,
    #[serde(default = "default_true")]
    pub record_explorations: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            token_flush_interval_ms: default_token_flush_interval_ms(),
            idle_timeout_secs: default_idle_timeout_secs(),
            session_timeout_secs: default_session_timeout_secs(),
            validation_timeout_secs: default_validation_timeout_secs(),
            max_alternatives: default_max_alternatives(),
            renderer_command: default_renderer_command(),
            record_explorations: true,
        }
    }
}

impl StreamConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the default config file (if any) and applies environment overrides.
    pub fn load() -> LocalBookResult<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!("No stream config at {}, using defaults", path.display());
                Self::default()
            }
            None => {
                warn!("Could not resolve config directory, using default stream config");
                Self::default()
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> LocalBookResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|e| {
            LocalBookError::config(format!("{}: {}", path.display(), e))
        })
    }

    pub fn from_toml_str(raw: &str) -> LocalBookResult<Self> {
        toml::from_str(raw).map_err(|e| LocalBookError::config(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.backend_url = url.to_string();
            }
        }
    }

    pub fn validate(&self) -> LocalBookResult<()> {
        if self.backend_url.trim().is_empty() {
            return Err(LocalBookError::config("backend_url must not be empty"));
        }
        if self.max_alternatives == 0 {
            return Err(LocalBookError::config("max_alternatives must be at least 1"));
        }
        if self.validation_timeout_secs == 0 {
            return Err(LocalBookError::config(
                "validation_timeout_secs must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn token_flush_interval(&self) -> Duration {
        Duration::from_millis(self.token_flush_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }

    /// Joins an endpoint path onto the backend base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.backend_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
