//! Server configuration.
//!
//! Layered as defaults, then the TOML file, then `HUDDLE__*` environment
//! variables (`HUDDLE__SERVER__PORT=9000`).

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::session::DEFAULT_SESSION_LIFETIME_SECS;

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "HUDDLE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory of the web client, served for unmatched paths.
    pub static_dir: Option<String>,
    /// Origins allowed to call the API with credentials. Empty mirrors the
    /// request origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: None,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file. Defaults to `huddle.db` in the data directory.
    pub path: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub lifetime_secs: i64,
    /// Seconds between sweeps of expired sessions; 0 disables the sweep.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: DEFAULT_SESSION_LIFETIME_SECS,
            sweep_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
    /// Add the `Secure` attribute to the session cookie.
    pub secure_cookie: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: 10,
            secure_cookie: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path` (optional) and the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let built = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000_i64)?
            .set_default("session.lifetime_secs", DEFAULT_SESSION_LIFETIME_SECS)?
            .set_default("auth.bcrypt_cost", 10_i64)?
            .set_default("logging.level", "info")?
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("loading config from {}", path.display()))?;

        built
            .try_deserialize()
            .context("deserializing configuration")
    }

    /// Session lifetime as a duration.
    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session.lifetime_secs.max(1))
    }

    /// Default config as TOML, for `init`.
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("serializing default config to TOML")
    }
}
