use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use thiserror::Error;
use tracing::warn;

use crate::pager::PagerOptions;
use crate::progress::DEFAULT_DEBOUNCE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to write config {path}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode config")]
    Encode(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub reading: ReadingConfig,
    pub layout: LayoutConfig,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingConfig {
    /// Quiet period before the reading position is written out.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "debounce_ms")]
    pub debounce: Duration,
    /// Snap page ends to punctuation and whitespace.
    pub smart_break: bool,
    /// Reopen the last document when started without a file.
    pub restore_last: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Blank columns on each side of the text.
    pub margin: u16,
    /// Terminal rows per line of text.
    pub line_spacing: u16,
    /// Upper bound on chars per page, 0 for none.
    pub max_chars_per_page: usize,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            smart_break: true,
            restore_last: true,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            margin: 2,
            line_spacing: 1,
            max_chars_per_page: 0,
        }
    }
}

impl AppConfig {
    pub fn pager_options(&self) -> PagerOptions {
        PagerOptions {
            smart_break: self.reading.smart_break,
            ..PagerOptions::default()
        }
    }
}

pub fn parse_config(path: &Path, raw: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Reads the config at `path`. A missing file yields the defaults.
pub fn try_load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(raw) => parse_config(path, &raw),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Like [`try_load_config`] but falls back to the defaults on any error.
pub fn load_config(path: &Path) -> AppConfig {
    try_load_config(path).unwrap_or_else(|err| {
        warn!(?err, "using default configuration");
        AppConfig::default()
    })
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let data = toml::to_string_pretty(config)?;
    fs::write(path, data).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse_config(
            Path::new("config.toml"),
            "[reading]\ndebounce_ms = 1500\n\n[layout]\nline_spacing = 2\n",
        )
        .unwrap();
        assert_eq!(config.reading.debounce, Duration::from_millis(1500));
        assert!(config.reading.smart_break);
        assert_eq!(config.layout.line_spacing, 2);
        assert_eq!(config.layout.margin, 2);
    }

    #[test]
    fn missing_file_is_default_and_bad_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(try_load_config(&path).unwrap(), AppConfig::default());

        fs::write(&path, "reading = 3").unwrap();
        assert!(matches!(try_load_config(&path), Err(ConfigError::Parse { .. })));
        assert_eq!(load_config(&path), AppConfig::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.reading.smart_break = false;
        config.layout.max_chars_per_page = 900;
        save_config(&path, &config).unwrap();
        assert_eq!(try_load_config(&path).unwrap(), config);
        assert!(!config.pager_options().smart_break);
    }
}
