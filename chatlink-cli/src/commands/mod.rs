pub mod connect;
pub mod input;
pub mod settings;
pub mod version;

use anyhow::{Context, Result};
use chatlink::JsonSettingsStore;
use std::path::PathBuf;

/// Settings store at `path`, or at the per-user default location.
pub fn settings_store(path: Option<PathBuf>) -> Result<JsonSettingsStore> {
    let path = match path {
        Some(path) => path,
        None => JsonSettingsStore::default_path()
            .context("Cannot locate a config directory; pass --settings")?,
    };
    Ok(JsonSettingsStore::new(path))
}
