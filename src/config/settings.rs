//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// Event bus configuration
    pub bus: BusSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-1023)
    pub machine_id: u16,

    /// Custom epoch timestamp in milliseconds
    pub epoch: u64,
}

/// Event bus configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BusSettings {
    /// Per-subscription delivery buffer capacity.
    /// Events published while a subscriber's buffer is full are dropped.
    pub delivery_buffer: usize,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("snowflake.machine_id", 1)?
            .set_default("snowflake.epoch", 1577836800000_u64)?
            .set_default("bus.delivery_buffer", 256_i64)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__BUS__DELIVERY_BUFFER=512 -> bus.delivery_buffer = 512
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option(
                "snowflake.machine_id",
                std::env::var("SNOWFLAKE_MACHINE_ID").ok(),
            )?
            .build()?
            .try_deserialize()
    }

    /// Settings suitable for embedding and tests: defaults only, no files
    /// or environment lookups.
    pub fn for_tests() -> Self {
        Self {
            snowflake: SnowflakeSettings {
                machine_id: 1,
                epoch: 1577836800000,
            },
            bus: BusSettings {
                delivery_buffer: 256,
            },
            environment: "test".into(),
        }
    }
}
