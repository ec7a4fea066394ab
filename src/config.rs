use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Flat environment-sourced configuration, split into nested accessors
/// below for call sites that only need one slice of it.
#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub pg_url: String,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub database_min_connections: u32,

    #[serde(default = "default_host")]
    pub server_host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_origin_whitelist")]
    pub origin_whitelist: String,

    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_token_expires_in")]
    pub jwt_expires_in_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_modules_root")]
    pub modules_root: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_multipart_timeout_secs")]
    pub multipart_timeout_secs: u64,
    #[serde(default = "default_correlator_grace_secs")]
    pub correlator_grace_secs: u64,

    #[serde(default)]
    pub google_client_id: String,
    #[serde(default)]
    pub google_client_secret: String,
    #[serde(default)]
    pub google_redirect_uri: String,
    #[serde(default)]
    pub discord_client_id: String,
    #[serde(default)]
    pub discord_client_secret: String,
    #[serde(default)]
    pub discord_redirect_uri: String,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub secret_key: String,
    pub jwt_expires_in_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Instance-count table read from `<modules_root>/settings.json`, key
/// `loadBalancing.<moduleName>`.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ModulePlaneSettings {
    #[serde(default, rename = "loadBalancing")]
    pub load_balancing: HashMap<String, u32>,
}

fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    2
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_origin_whitelist() -> String {
    String::new()
}
fn default_secret_key() -> String {
    "change-me".to_string()
}
fn default_token_expires_in() -> u64 {
    12 * 3600 // 12h, per the wire contract
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_modules_root() -> String {
    "./modules".to_string()
}
fn default_request_timeout_secs() -> u64 {
    5
}
fn default_multipart_timeout_secs() -> u64 {
    30
}
fn default_correlator_grace_secs() -> u64 {
    1
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let config = envy::from_env::<Config>()
            .map_err(|e| AppError::Config(format!("Failed to load config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.database_max_connections == 0 {
            return Err(AppError::Config(
                "DATABASE_MAX_CONNECTIONS must be > 0".to_string(),
            ));
        }
        if self.database_min_connections > self.database_max_connections {
            return Err(AppError::Config(
                "DATABASE_MIN_CONNECTIONS cannot exceed DATABASE_MAX_CONNECTIONS".to_string(),
            ));
        }
        if self.secret_key == "change-me" {
            return Err(AppError::Config(
                "SECRET_KEY must be set to a secure value".to_string(),
            ));
        }
        if self.jwt_expires_in_secs == 0 {
            return Err(AppError::Config(
                "JWT expiry must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.port)
    }

    pub fn modules_root_path(&self) -> PathBuf {
        PathBuf::from(&self.modules_root)
    }

    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.pg_url.clone(),
            max_connections: self.database_max_connections,
            min_connections: self.database_min_connections,
        }
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            host: self.server_host.clone(),
            port: self.port,
            cors_origins: self
                .origin_whitelist
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn auth(&self) -> AuthConfig {
        AuthConfig {
            secret_key: self.secret_key.clone(),
            jwt_expires_in_secs: self.jwt_expires_in_secs,
        }
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format.clone(),
        }
    }

    /// Loads `settings.json` from the modules root, defaulting to an
    /// empty table when absent — a fresh install has no overrides yet.
    pub fn load_module_plane_settings(&self) -> ModulePlaneSettings {
        let path = self.modules_root_path().join("settings.json");
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => ModulePlaneSettings::default(),
        }
    }
}
