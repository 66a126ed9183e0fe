use anyhow::{Context, Result};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "ECGVIEW_CONFIG";
pub const SERVER_ENV: &str = "ECGVIEW_SERVER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Explicit path, then `$ECGVIEW_CONFIG`, then the per-user config file, then defaults.
    /// `$ECGVIEW_SERVER` overrides the server URL in every case.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match default_path() {
                Some(path) if path.exists() => Self::load(&path)?,
                _ => Self::default(),
            },
        };
        if let Ok(url) = env::var(SERVER_ENV) {
            if !url.trim().is_empty() {
                config.server.base_url = url;
            }
        }
        Ok(config)
    }
}

pub fn default_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    config_dir().map(|dir| dir.join("ecgview/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_files_keep_defaults() {
        let config = Config::parse("[server]\nbase_url = \"http://ecg.local:8080\"\n").unwrap();
        assert_eq!(config.server.base_url, "http://ecg.local:8080");
        assert_eq!(config.logging.level, "info");
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn loads_from_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(Config::parse("[server\nbase_url = 1").is_err());
    }
}
