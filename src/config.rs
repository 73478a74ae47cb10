//! Application Configuration
//!
//! Loads `config.yaml` when present and falls back to sensible defaults.
//! Secrets (JWT key, database URI, media API key) can be overridden from
//! the environment so they stay out of the config file.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Document store backend types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DatabaseBackend {
    Mongo,
    Mock,
}

impl Default for DatabaseBackend {
    fn default() -> Self {
        DatabaseBackend::Mongo
    }
}

/// Media host backend types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MediaBackend {
    Http,
    Mock,
}

impl Default for MediaBackend {
    fn default() -> Self {
        MediaBackend::Http
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// Connection string, e.g. mongodb://127.0.0.1:27017
    pub uri: String,
    pub db_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for token signing
    pub jwt_secret: String,
    /// Cookie and token lifetime
    pub token_ttl_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub backend: MediaBackend,
    /// Local staging directory for uploads in flight
    pub staging_path: String,
    /// External image host upload endpoint
    pub upload_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Path to log configuration file
    pub config_file: String,
}

const CONFIG_PATH: &str = "config.yaml";

impl AppConfig {
    /// Load configuration from file, use defaults if not found. Environment
    /// overrides are applied last either way.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = if Path::new(CONFIG_PATH).exists() {
            let content = fs::read_to_string(CONFIG_PATH)?;
            let config: AppConfig = serde_yaml::from_str(&content)?;
            info!("Loaded configuration from {}", CONFIG_PATH);
            config
        } else {
            warn!("Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = env::var("SECRET_JWT") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(uri) = env::var("DATABASE_URI") {
            self.database.uri = uri;
        }
        if let Ok(key) = env::var("MEDIA_API_KEY") {
            self.media.api_key = key;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                workers: 4,
            },
            database: DatabaseConfig {
                backend: DatabaseBackend::Mongo,
                uri: "mongodb://127.0.0.1:27017".to_string(),
                db_name: "moonhalo".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "development-secret-change-me".to_string(),
                token_ttl_days: 7,
            },
            media: MediaConfig {
                backend: MediaBackend::Http,
                staging_path: "./temp".to_string(),
                upload_url: "https://api.media.example/v2/upload".to_string(),
                api_key: String::new(),
            },
            logging: LoggingConfig {
                config_file: "server_log.yaml".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_are_usable() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.backend, DatabaseBackend::Mongo);
        assert_eq!(config.auth.token_ttl_days, 7);
        assert!(!config.media.staging_path.is_empty());
    }

    #[test]
    #[serial]
    fn env_overrides_take_precedence() {
        env::set_var("SECRET_JWT", "from-env");
        env::set_var("DATABASE_URI", "mongodb://db.internal:27017");

        let mut config = AppConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.auth.jwt_secret, "from-env");
        assert_eq!(config.database.uri, "mongodb://db.internal:27017");

        env::remove_var("SECRET_JWT");
        env::remove_var("DATABASE_URI");
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = AppConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.server.host, config.server.host);
        assert_eq!(parsed.database.backend, config.database.backend);
    }
}
