use serde::Deserialize;
use std::env;

use torque_storage::StorageSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageSettings,
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

/// Bootstrap admin account, created on startup if absent.
#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Layer the per-environment file on top; it is optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // A local override file, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables win, e.g. TORQUE_DATABASE__URL
            .add_source(config::Environment::with_prefix("TORQUE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
