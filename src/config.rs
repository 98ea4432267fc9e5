use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults — the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Dataset file for the active chart year (used when the CLI gets no
    /// `--data` argument).
    pub data_path: Option<PathBuf>,
    /// Base URL for fetching archived year datasets.
    pub data_url: Option<String>,
    /// Custom directory for imported year dumps (overrides XDG default).
    pub years_dir: Option<PathBuf>,
    /// Oversleep beyond this many milliseconds counts as a suspend and
    /// triggers a drift resync in the play loop.
    pub resync_threshold_ms: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            data_url: None,
            years_dir: None,
            resync_threshold_ms: 5_000,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/chartcast/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!(
                            "Failed to parse {}: {}. Using defaults.",
                            path.display(),
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!(
                        "Failed to read {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Default dataset path: the exporter's file name in the working
/// directory.
pub fn default_data_path() -> PathBuf {
    PathBuf::from("output-sorted.json")
}
