//! Configuration system using TOML files.
//!
//! The config file is looked up at `$MUSIC_CATALOG_CONFIG`, or else in the
//! OS-standard config directory:
//! - Windows: %APPDATA%\music-catalog\config.toml
//! - macOS: ~/Library/Application Support/music-catalog/config.toml
//! - Linux: ~/.config/music-catalog/config.toml
//!
//! Every setting has a default and command-line flags override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::scanner::ScanOptions;
use crate::store::sqlite::DEFAULT_DB_NAME;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MUSIC_CATALOG_CONFIG";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog location
    pub library: LibraryConfig,

    /// Import defaults
    pub import: ImportConfig,
}

/// Catalog location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// SQLite database file
    pub database: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DB_NAME),
        }
    }
}

/// Import defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Where unreadable file paths are written
    pub log_path: Option<PathBuf>,

    /// Import non-audio files as attachments
    pub attachments: bool,

    /// Compute checksums for every imported file
    pub checksums: bool,

    /// Extensions treated as audio (case-insensitive)
    pub audio_extensions: Vec<String>,

    /// Image stems treated as covers (case-insensitive)
    pub cover_names: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            attachments: false,
            checksums: false,
            audio_extensions: [
                "mp3", "flac", "ogg", "oga", "opus", "m4a", "mp4", "aac", "wav", "aiff", "aif",
                "wma", "ape", "wv", "mpc",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            cover_names: ["cover", "folder", "album", "front", "artwork", "albumart"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ImportConfig {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions::new(&self.audio_extensions, &self.cover_names)
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("music-catalog"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => config_dir().map(|d| d.join("config.toml")),
    }
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::debug!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match load_from(&path) {
        Ok(config) => {
            tracing::debug!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            tracing::error!("{}", e);
            tracing::warn!("Using default configuration");
            Config::default()
        }
    }
}

/// Load and parse one config file.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

// ============================================================================
// Tests
// ============================================================================
