//! Manager settings
//!
//! Manages behaviour switches stored in ~/.pgmanager/config.toml

use crate::config::ConnectionConfig;
use crate::error::ConfigResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How multiple `query` filters are combined in the WHERE clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterJoin {
    /// `a AND b`
    #[default]
    And,
    /// `a,b`, reproduces the legacy statement text (rejected by PostgreSQL
    /// once there is more than one filter)
    Comma,
}

impl FilterJoin {
    /// Separator placed between filter fragments
    pub fn separator(&self) -> &'static str {
        match self {
            FilterJoin::And => " AND ",
            FilterJoin::Comma => ",",
        }
    }
}

/// Table manager settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub filter_join: FilterJoin,

    /// Directory holding `<ClassName>.ddl` files. When unset the model's
    /// own `models/` directory is used.
    #[serde(default)]
    pub ddl_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub log_statements: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            filter_join: FilterJoin::default(),
            ddl_dir: None,
            log_statements: default_true(),
        }
    }
}

/// Load settings from config file
pub fn load_settings() -> ConfigResult<Settings> {
    let path = ConnectionConfig::config_dir()?.join("config.toml");
    load_settings_from(&path)
}

/// Load settings from an explicit path, falling back to defaults when absent
pub fn load_settings_from(path: &Path) -> ConfigResult<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::error::ConfigError::NotFound(format!("Failed to read settings file: {}", e))
    })?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}
