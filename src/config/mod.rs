//! Application configuration module.
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Values are read with the `MEDROUTE_`
//! prefix and nested sections use `__` as separator, e.g.
//! `MEDROUTE_AI__API_KEY`.
//!
//! # Example
//!
//! ```no_run
//! use medroute::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod agent;
mod ai;
mod coverage;
mod error;
mod redis;

pub use agent::AgentConfig;
pub use ai::AiConfig;
pub use coverage::CoverageConfig;
pub use error::{ConfigError, ValidationError};
pub use redis::RedisConfig;

use serde::Deserialize;

/// Root application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Agent identity and session limits.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Model provider settings.
    #[serde(default)]
    pub ai: AiConfig,

    /// Redis session store settings.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Coverage zone and guard settings.
    #[serde(default)]
    pub coverage: CoverageConfig,
}

impl AppConfig {
    /// Loads configuration from the environment (and a `.env` file when
    /// present).
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("MEDROUTE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validates every configuration section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.agent.validate()?;
        self.ai.validate()?;
        self.redis.validate()?;
        Ok(())
    }
}
