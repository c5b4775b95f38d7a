//! Redis configuration.

use serde::Deserialize;

use super::error::ValidationError;

/// Redis connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Connection URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Key prefix for session entries.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl RedisConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_key_prefix() -> String {
    "transport:session:".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url_is_valid() {
        assert!(RedisConfig::default().validate().is_ok());
    }

    #[test]
    fn tls_url_is_valid() {
        let config = RedisConfig {
            url: "rediss://cache.internal:6380/0".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_redis_url_fails() {
        let config = RedisConfig {
            url: "http://localhost".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidRedisUrl));
    }
}
