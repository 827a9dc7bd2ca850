//! Configuration for keycache
//!
//! Settings are plain serde types. The embedding application decides where
//! they come from and passes them in; nothing here reads files or the
//! environment.

use crate::crypto::MIN_RSA_BITS;
use crate::errors::{KeyCacheError, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key store configuration
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// In-memory key store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// RSA keys with a smaller modulus are refused
    pub min_rsa_bits: usize,

    /// Maximum identifier length in bytes
    pub max_id_len: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            min_rsa_bits: 2048,
            max_id_len: 256,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.logging.validate()
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_rsa_bits < MIN_RSA_BITS {
            return Err(KeyCacheError::ConfigError(format!(
                "min_rsa_bits must be at least {}, got {}",
                MIN_RSA_BITS, self.min_rsa_bits
            )));
        }

        if self.max_id_len == 0 {
            return Err(KeyCacheError::ConfigError(
                "max_id_len must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        match self.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(KeyCacheError::ConfigError(format!(
                "Unknown log format: {}",
                other
            ))),
        }
    }
}
