use crate::error::ConfigError;
use crate::render::DEFAULT_DEBOUNCE;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bundled config for builds that ship without a .env file (mobile, web)
const BUNDLED_CONFIG: &str = include_str!("../assets/config.env");

const API_URL: &str = "JARVIS_API_URL";
const USER_ID: &str = "JARVIS_USER_ID";
const RENDER_DEBOUNCE_MS: &str = "JARVIS_RENDER_DEBOUNCE_MS";
const LOG_LEVEL: &str = "JARVIS_LOG";

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub user_id: String,
    pub render_debounce: Duration,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            user_id: "default".to_string(),
            render_debounce: DEFAULT_DEBOUNCE,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the process environment, falling back to the bundled defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bundled = parse_env_lines(BUNDLED_CONFIG);
        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .or_else(|| bundled.get(key).cloned())
        })
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup(API_URL) {
            config.api_base_url = non_empty(API_URL, url)?;
        }
        if let Some(user) = lookup(USER_ID) {
            config.user_id = non_empty(USER_ID, user)?;
        }
        if let Some(raw) = lookup(RENDER_DEBOUNCE_MS) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidDuration {
                    key: RENDER_DEBOUNCE_MS,
                    value: raw.clone(),
                })?;
            config.render_debounce = Duration::from_millis(millis);
        }
        if let Some(level) = lookup(LOG_LEVEL) {
            config.log_level = non_empty(LOG_LEVEL, level)?;
        }

        Ok(config)
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }
}

fn non_empty(key: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty { key });
    }
    Ok(trimmed.to_string())
}

/// Which env files were read. Loading runs before logging is set up, so the
/// caller logs this afterwards.
#[derive(Debug, Default)]
pub struct DotenvReport {
    pub loaded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl DotenvReport {
    fn load_file(&mut self, path: &Path) {
        if !path.exists() {
            return;
        }
        match dotenvy::from_path(path) {
            Ok(()) => self.loaded.push(path.to_path_buf()),
            Err(err) => self.failed.push((path.to_path_buf(), err.to_string())),
        }
    }

    pub fn log(&self) {
        for path in &self.loaded {
            tracing::debug!("loaded {}", path.display());
        }
        for (path, err) in &self.failed {
            tracing::warn!("failed to read {}: {}", path.display(), err);
        }
    }
}

/// Loads `.env` from the working directory, then the per-user config file.
/// Neither overrides variables that are already set.
pub fn load_dotenv() -> DotenvReport {
    let mut report = DotenvReport::default();
    match dotenvy::dotenv() {
        Ok(path) => report.loaded.push(path),
        Err(err) if err.not_found() => {}
        Err(err) => report.failed.push((PathBuf::from(".env"), err.to_string())),
    }
    if let Some(path) = user_config_path() {
        report.load_file(&path);
    }
    report
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("jarvis").join("config.env"))
}

fn parse_env_lines(source: &str) -> HashMap<String, String> {
    source
        .lines()
        .map(str::trim)
        // Skip comments and empty lines
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.render_debounce, Duration::from_millis(100));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (API_URL, "https://jarvis.example.com/"),
            (USER_ID, " alice "),
            (RENDER_DEBOUNCE_MS, "250"),
            (LOG_LEVEL, "debug"),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url, "https://jarvis.example.com/");
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.render_debounce, Duration::from_millis(250));
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_invalid_debounce_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[(RENDER_DEBOUNCE_MS, "fast")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));
    }

    #[test]
    fn test_empty_user_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[(USER_ID, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Empty { key: USER_ID }));
    }

    #[test]
    fn test_broken_env_file_is_reported_not_dropped() {
        let path = std::env::temp_dir().join(format!("jarvis-broken-{}.env", std::process::id()));
        std::fs::write(&path, "JARVIS_TEST_BROKEN='unterminated\n").unwrap();

        let mut report = DotenvReport::default();
        report.load_file(&path);
        std::fs::remove_file(&path).ok();

        assert!(report.loaded.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, path);
    }

    #[test]
    fn test_missing_env_file_is_skipped() {
        let mut report = DotenvReport::default();
        report.load_file(Path::new("/nonexistent/jarvis/config.env"));
        assert!(report.loaded.is_empty());
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_bundled_config_parses() {
        let bundled = parse_env_lines(BUNDLED_CONFIG);
        assert_eq!(bundled.get(RENDER_DEBOUNCE_MS).map(String::as_str), Some("100"));
        assert!(!bundled.keys().any(|key| key.starts_with('#')));
    }
}
