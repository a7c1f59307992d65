use std::path::PathBuf;

use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::Deserialize;

use crate::cache::DEFAULT_MAX_BYTES;
use crate::cache::queries::DEFAULT_PAYLOAD_KEY;

/// Data endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://script.google.com/macros/s/AKfycbzy7CNn83anQMEsvNxyK3zHMtTRtjHk6XZ-jWBNllRNxcXv41hKw-TenGoGjfpps6rLUw/exec";

/// Application configuration loaded from TOML config file.
/// All fields have defaults; the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the data endpoint (`?action=getAllData` is appended).
    pub endpoint: String,
    /// Custom cache database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    pub cache: CacheConfig,
    pub calendar: CalendarConfig,
    pub history: HistoryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            db_path: None,
            cache: CacheConfig::default(),
            calendar: CalendarConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Key the payload is stored under.
    pub key: String,
    /// Upper bound on the cache database size.
    pub max_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_PAYLOAD_KEY.to_string(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Civil time zone for "today", hours east of UTC. Tokyo by default.
    pub utc_offset_hours: i32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self { utc_offset_hours: 9 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// First month of the timeline.
    pub start: NaiveDate,
    /// Birth date used for the age column and release-day ages.
    pub birth_date: NaiveDate,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(1996, 8, 1).unwrap_or_default(),
            birth_date: NaiveDate::from_ymd_opt(1975, 11, 22).unwrap_or_default(),
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/encore/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Cache database path: the configured one, else the XDG data dir.
    pub fn resolve_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default cache path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("encore.db")
    } else {
        PathBuf::from("encore.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.cache.key, DEFAULT_PAYLOAD_KEY);
        assert_eq!(config.calendar.utc_offset_hours, 9);
        assert_eq!(config.history.start, NaiveDate::from_ymd_opt(1996, 8, 1).unwrap());
    }

    #[test]
    fn test_partial_file() {
        let config = AppConfig::parse(
            r#"
            endpoint = "http://localhost:8080/exec"

            [cache]
            max_bytes = 1048576

            [history]
            start = "2000-01-01"
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint, "http://localhost:8080/exec");
        assert_eq!(config.cache.max_bytes, 1_048_576);
        assert_eq!(config.cache.key, DEFAULT_PAYLOAD_KEY);
        assert_eq!(config.history.start, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        assert_eq!(config.history.birth_date, NaiveDate::from_ymd_opt(1975, 11, 22).unwrap());
    }

    #[test]
    fn test_bad_file_is_error() {
        assert!(AppConfig::parse("endpoint = [").is_err());
    }
}
