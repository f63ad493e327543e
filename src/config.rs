// src/config.rs

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("failed to read policy file {path}: {reason}")]
    PolicyFile { path: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When absent sessions are kept in memory.
    pub database_url: Option<String>,
    pub rust_log: String,
    pub bind_addr: String,
    pub log_dir: String,
    /// JSON file with classifier rules merged over the built-in table.
    pub policy_path: Option<PathBuf>,
    pub no_face_grace_secs: u64,
    /// When set, replaces the sustained threshold of the `no_face_detected`
    /// rule, including one loaded from the policy file.
    pub no_face_escalate_secs: Option<u64>,
    pub screen_away_threshold_ms: u64,
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            rust_log: "info".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            log_dir: "logs".to_string(),
            policy_path: None,
            no_face_grace_secs: 5,
            no_face_escalate_secs: None,
            screen_away_threshold_ms: 2000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let rust_log = env::var("RUST_LOG").unwrap_or(defaults.rust_log);
        let bind_addr = env::var("BIND_ADDR").unwrap_or(defaults.bind_addr);
        let log_dir = env::var("LOG_DIR").unwrap_or(defaults.log_dir);

        let policy_path = env::var("PROCTOR_POLICY_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => defaults.cors_origins,
        };

        Ok(Self {
            database_url,
            rust_log,
            bind_addr,
            log_dir,
            policy_path,
            no_face_grace_secs: read_u64("NO_FACE_GRACE_SECS", defaults.no_face_grace_secs)?,
            no_face_escalate_secs: read_optional_u64("NO_FACE_ESCALATE_SECS")?,
            screen_away_threshold_ms: read_u64(
                "SCREEN_AWAY_THRESHOLD_MS",
                defaults.screen_away_threshold_ms,
            )?,
            cors_origins,
        })
    }
}

fn read_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) => parse_u64(name, &value),
        Err(_) => Ok(default),
    }
}

fn read_optional_u64(name: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => parse_u64(name, &value).map(Some),
        _ => Ok(None),
    }
}

fn parse_u64(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u64_rejects_garbage() {
        assert_eq!(parse_u64("X", " 42 ").unwrap(), 42);
        assert!(matches!(
            parse_u64("X", "-1"),
            Err(ConfigError::InvalidNumber { name: "X", .. })
        ));
        assert!(parse_u64("X", "ten").is_err());
    }

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.database_url.is_none());
        assert_eq!(config.no_face_grace_secs, 5);
        assert!(config.no_face_escalate_secs.is_none());
        assert_eq!(config.cors_origins.len(), 2);
    }
}
