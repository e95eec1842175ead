//! Batch client configuration
//!
//! Loaded from a TOML/YAML/JSON file with `VOLTAGE_BATCH_*` environment
//! overrides. Priority (highest to lowest):
//! 1. Environment variables (e.g. `VOLTAGE_BATCH_MAX_WRITE_REGISTERS=60`)
//! 2. Config file
//! 3. Default values

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BatchError, Result};
use crate::ops::{MAX_READ_QUANTITY, MAX_WRITE_QUANTITY};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "VOLTAGE_BATCH_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Skip writes whose value matches the caller's snapshot
    pub differential_writes: bool,
    /// Registers per merged read, at most 2047
    pub max_read_registers: u16,
    /// Registers per merged write, at most 123
    pub max_write_registers: u16,
    /// Retry a failed wire call once before aborting the batch
    pub retry_failed_ops: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            differential_writes: true,
            max_read_registers: MAX_READ_QUANTITY,
            max_write_registers: MAX_WRITE_QUANTITY,
            retry_failed_ops: true,
        }
    }
}

impl BatchConfig {
    /// Load from a config file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| BatchError::Config("Config file must have an extension".to_string()))?;

        let figment = Figment::from(Serialized::defaults(Self::default()));
        let figment = match extension {
            "toml" => figment.merge(Toml::file(path)),
            "yaml" | "yml" => figment.merge(Yaml::file(path)),
            "json" => figment.merge(Json::file(path)),
            _ => {
                return Err(BatchError::Config(format!(
                    "Unsupported config file format: {}",
                    extension
                )))
            }
        };

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| BatchError::Config(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_limit("max_read_registers", self.max_read_registers, MAX_READ_QUANTITY)?;
        check_limit("max_write_registers", self.max_write_registers, MAX_WRITE_QUANTITY)
    }
}

fn check_limit(field: &str, value: u16, ceiling: u16) -> Result<()> {
    if value == 0 || value > ceiling {
        return Err(BatchError::InvalidConfig {
            field: field.to_string(),
            reason: format!("{} not in [1, {}]", value, ceiling),
        });
    }
    Ok(())
}
