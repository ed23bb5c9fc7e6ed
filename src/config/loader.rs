//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::{RouterConfig, ServiceConfig};

/// Environment variable naming an explicit config path.
pub const CONFIG_PATH_ENV: &str = "ROUTER_CONFIG_PATH";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    ParseToml(toml::de::Error),
    ParseJson(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseToml(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::ParseJson(e) => write!(f, "JSON parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from a JSON or TOML file, chosen by extension.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;

    let config = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&content).map_err(ConfigError::ParseToml)?
    } else {
        serde_json::from_str(&content).map_err(ConfigError::ParseJson)?
    };

    Ok(config)
}

/// Load configuration from the first readable candidate path.
///
/// Candidates, in order: the explicit path (if given), `ROUTER_CONFIG_PATH`,
/// then `config.json` and `config.toml` in the working directory. A malformed
/// or missing configuration is not fatal: the router falls back to a minimal
/// single-service default so it can still serve traffic.
pub fn load_or_fallback(explicit: Option<&Path>) -> RouterConfig {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        candidates.push(PathBuf::from(path));
    }
    candidates.push(PathBuf::from("config.json"));
    candidates.push(PathBuf::from("config.toml"));

    for candidate in &candidates {
        if !candidate.exists() {
            continue;
        }
        match load_config(candidate) {
            Ok(config) => {
                tracing::info!(path = %candidate.display(), "Configuration loaded");
                return config;
            }
            Err(e) => {
                tracing::error!(path = %candidate.display(), error = %e, "Failed to load config");
            }
        }
    }

    tracing::warn!("No usable config file found, using fallback configuration");
    fallback_config()
}

/// Minimal single-service configuration used when no config file loads.
pub fn fallback_config() -> RouterConfig {
    RouterConfig {
        ai_services: vec![ServiceConfig {
            name: "local".to_string(),
            url: "http://localhost:5001".to_string(),
            priority: 1,
            timeout: None,
            enabled: true,
        }],
        ..RouterConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn load_json_config() {
        let dir = std::env::temp_dir().join("ai-router-loader-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "ai_services": [
                    {{"name": "primary", "url": "http://127.0.0.1:5001", "priority": 1}},
                    {{"name": "backup", "url": "http://127.0.0.1:5002", "priority": 2, "enabled": false}}
                ],
                "circuit_breaker": {{"failure_threshold": 3, "recovery_timeout": 30}}
            }}"#
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.ai_services.len(), 2);
        assert_eq!(config.ai_services[0].name, "primary");
        assert!(!config.ai_services[1].enabled);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
    }

    #[test]
    fn load_toml_config() {
        let dir = std::env::temp_dir().join("ai-router-loader-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"
            default_timeout = 120

            [[ai_services]]
            name = "primary"
            url = "http://127.0.0.1:5001"

            [load_balancing]
            strategy = "round_robin"
            "#
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.default_timeout, 120);
        assert_eq!(config.ai_services[0].priority, 999);
        assert_eq!(
            config.load_balancing.strategy,
            crate::config::Strategy::RoundRobin
        );
    }

    #[test]
    fn fallback_has_one_enabled_service() {
        let config = fallback_config();
        assert_eq!(config.ai_services.len(), 1);
        assert!(config.ai_services[0].enabled);
    }
}
