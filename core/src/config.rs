use std::{path::Path, time::Duration};

use anyhow::{Context, Result};

use ini::Ini;

use crate::{
    utils::{strbool, strlist},
    CONFIG_FILE_NAME,
};

pub const DEFAULT_BLACKLIST_DIRECTORIES: [&str; 3] = [".mypy_cache", "__pycache__", ".DS_Store"];
pub const DEFAULT_BLACKLIST_EXTENSIONS: [&str; 1] = [".py~"];
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Path segments which exclude an event from synchronization
    pub blacklist_directories: Vec<String>,
    /// File name suffixes which exclude an event from synchronization
    pub blacklist_extensions: Vec<String>,
    /// When not empty, only events located under one of these directories are
    /// synchronized
    pub directories: Vec<String>,
    pub debounce: Duration,
    /// Replay already satisfied events on the target side instead of failing
    pub replay: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            blacklist_directories: DEFAULT_BLACKLIST_DIRECTORIES
                .iter()
                .map(|v| v.to_string())
                .collect(),
            blacklist_extensions: DEFAULT_BLACKLIST_EXTENSIONS
                .iter()
                .map(|v| v.to_string())
                .collect(),
            directories: vec![],
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            replay: true,
        }
    }
}

impl SyncConfig {
    /// Load user config file, or defaults when there is none
    pub fn from_env() -> Result<Self> {
        let user_home_folder_path = dirs::home_dir().context("Unable to determine home folder")?;
        let config_file_path = if cfg!(target_os = "windows") {
            user_home_folder_path
                .join("AppData")
                .join("Local")
                .join(CONFIG_FILE_NAME.trim_start_matches('.'))
        } else {
            user_home_folder_path.join(CONFIG_FILE_NAME)
        };

        if !config_file_path.exists() {
            log::debug!(
                "No config file at '{}', use default config",
                config_file_path.display()
            );
            return Ok(Self::default());
        }

        Self::from_file(&config_file_path)
    }

    pub fn from_file(config_file_path: &Path) -> Result<Self> {
        let config_ini = Ini::load_from_file(config_file_path).context(format!(
            "Error when loading config file at '{}'",
            config_file_path.display()
        ))?;
        Self::from_ini(config_ini)
    }

    pub fn from_ini(config_ini: Ini) -> Result<Self> {
        let default = Self::default();
        let sync = match config_ini.section(Some("sync")) {
            Some(sync) => sync,
            None => return Ok(default),
        };

        let blacklist_directories = sync
            .get("blacklist_directories")
            .map(strlist)
            .unwrap_or(default.blacklist_directories);
        let blacklist_extensions = sync
            .get("blacklist_extensions")
            .map(strlist)
            .unwrap_or(default.blacklist_extensions);
        let directories = strlist(sync.get("directories").unwrap_or(""));
        let debounce = match sync.get("debounce_ms") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse::<u64>()
                    .context("Unable to read debounce_ms config from sync section")?,
            ),
            None => default.debounce,
        };
        let replay = strbool(sync.get("replay").unwrap_or("1"));

        Ok(Self {
            blacklist_directories,
            blacklist_extensions,
            directories,
            debounce,
            replay,
        })
    }
}
