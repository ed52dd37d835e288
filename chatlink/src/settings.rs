//! Persisted connection settings
//!
//! Front ends use these to pre-fill the next `connect`. The engine never
//! reads them; reconnection only uses the parameters of the live session.

use crate::common::{Result, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SETTINGS_FILE: &str = "settings.json";

/// What a user asked us to remember about their last connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub remember: bool,
    /// Set once a connect with these values succeeded
    pub last_connection_success: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            username: String::new(),
            remember: false,
            last_connection_success: false,
        }
    }
}

impl Settings {
    /// Values to pre-fill a connect form with: the saved ones if the user
    /// asked to remember them and they worked last time, else defaults.
    pub fn prefill(&self) -> Self {
        if self.remember && self.last_connection_success {
            self.clone()
        } else {
            Self::default()
        }
    }
}

/// Load/save collaborator for [`Settings`].
pub trait SettingsStore {
    /// Never fails; a missing or unreadable store yields defaults.
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Stores settings as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$XDG_CONFIG_HOME/chatlink/settings.json`, falling back to
    /// `$HOME/.config/chatlink/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("chatlink").join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Settings {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}", self.path.display());
                return Settings::default();
            }
            Err(e) => {
                warn!("Cannot read settings {}: {}", self.path.display(), e);
                return Settings::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring malformed settings {}: {}", self.path.display(), e);
            Settings::default()
        })
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json)?;
        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
