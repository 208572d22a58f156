//! Configuration management for the Home Service backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with HOMESVC_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// `database.url` value that selects the in-memory ledger store
pub const MEMORY_DATABASE_URL: &str = "memory";

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Stock movement behaviour
    pub inventory: InventoryConfig,

    /// Alert scanner configuration
    pub alerts: AlertsConfig,

    /// Log output configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL, or "memory"
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url == MEMORY_DATABASE_URL
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify JWT tokens issued by the auth service
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InventoryConfig {
    /// Apply a multi-batch consumption in one storage transaction instead
    /// of one transaction per batch
    pub atomic_consumption: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    /// Run the periodic alert scanner
    pub enabled: bool,

    /// Hours between scans
    pub scan_interval_hours: u64,

    /// Webhook receiving notifications; notifications are only logged when unset
    pub webhook_url: Option<String>,

    /// Seconds before a webhook request is abandoned
    pub webhook_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Emit JSON log lines
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("HOMESVC_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("inventory.atomic_consumption", false)?
            .set_default("alerts.enabled", true)?
            .set_default("alerts.scan_interval_hours", 6)?
            .set_default("alerts.webhook_timeout_secs", 10)?
            .set_default("logging.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (HOMESVC_ prefix)
            .add_source(
                Environment::with_prefix("HOMESVC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
