//! Configuration file support.
//!
//! Settings are read from an INI file, by default
//! `<config dir>/mediation/config.ini`:
//!
//! ```ini
//! [waterfall]
//! load_timeout_ms = 5000
//!
//! [assets]
//! prefetch = true
//! download_timeout_secs = 10
//!
//! [logging]
//! level = info
//! directory =
//! ```
//!
//! A missing file yields defaults. A missing key keeps its default; a key
//! with an unparseable value is an error naming the section and key.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::assets::DEFAULT_DOWNLOAD_TIMEOUT_SECS;
use crate::logging::LoggingConfig;
use crate::waterfall::{WaterfallConfig, DEFAULT_LOAD_TIMEOUT_MS};

const CONFIG_DIR_NAME: &str = "mediation";
const CONFIG_FILE_NAME: &str = "config.ini";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Errors that can occur when loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("failed to write config file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for {section}.{key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaterfallSettings {
    pub load_timeout_ms: u64,
}

impl Default for WaterfallSettings {
    fn default() -> Self {
        Self {
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSettings {
    pub prefetch: bool,
    pub download_timeout_secs: u64,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            prefetch: true,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    /// `None` logs to stderr only.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub waterfall: WaterfallSettings,
    pub assets: AssetSettings,
    pub logging: LoggingSettings,
}

/// Default location of the configuration file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

impl ConfigFile {
    /// Load from the default location, or defaults if the file is absent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path()?;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("waterfall")) {
            if let Some(ms) = parse_u64(section, "waterfall", "load_timeout_ms")? {
                if ms == 0 {
                    return Err(ConfigError::InvalidValue {
                        section: "waterfall",
                        key: "load_timeout_ms",
                        value: ms.to_string(),
                        reason: "must be greater than zero".to_string(),
                    });
                }
                config.waterfall.load_timeout_ms = ms;
            }
        }

        if let Some(section) = ini.section(Some("assets")) {
            if let Some(prefetch) = parse_bool(section, "assets", "prefetch")? {
                config.assets.prefetch = prefetch;
            }
            if let Some(secs) = parse_u64(section, "assets", "download_timeout_secs")? {
                config.assets.download_timeout_secs = secs;
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(level) = non_empty(section, "level") {
                let level = level.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(ConfigError::InvalidValue {
                        section: "logging",
                        key: "level",
                        value: level,
                        reason: format!("expected one of {}", LOG_LEVELS.join(", ")),
                    });
                }
                config.logging.level = level;
            }
            config.logging.directory = non_empty(section, "directory").map(PathBuf::from);
        }

        Ok(config)
    }

    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("waterfall"))
            .set("load_timeout_ms", self.waterfall.load_timeout_ms.to_string());
        ini.with_section(Some("assets"))
            .set("prefetch", self.assets.prefetch.to_string())
            .set(
                "download_timeout_secs",
                self.assets.download_timeout_secs.to_string(),
            );
        ini.with_section(Some("logging"))
            .set("level", self.logging.level.clone())
            .set(
                "directory",
                self.logging
                    .directory
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_default(),
            );
        ini
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn to_waterfall_config(&self) -> WaterfallConfig {
        WaterfallConfig::default()
            .with_load_timeout(Duration::from_millis(self.waterfall.load_timeout_ms))
    }

    pub fn to_logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.logging.level.clone(),
            directory: self.logging.directory.clone(),
            ..LoggingConfig::default()
        }
    }
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_u64(
    section: &Properties,
    section_name: &'static str,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    non_empty(section, key)
        .map(|raw| {
            raw.parse().map_err(|_| ConfigError::InvalidValue {
                section: section_name,
                key,
                value: raw.to_string(),
                reason: "expected a non-negative integer".to_string(),
            })
        })
        .transpose()
}

fn parse_bool(
    section: &Properties,
    section_name: &'static str,
    key: &'static str,
) -> Result<Option<bool>, ConfigError> {
    non_empty(section, key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                section: section_name,
                key,
                value: raw.to_string(),
                reason: "expected true or false".to_string(),
            }),
        })
        .transpose()
}
