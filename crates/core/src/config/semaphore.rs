// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semaphore configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! resource = "testing"
//! capacity = 3
//!
//! [broker]
//! host = "127.0.0.1"
//! username = "guest"
//! password = "guest"
//! ```

use super::{BrokerConfig, ConfigError};
use crate::resource::ResourceName;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything a client needs to join (or create) a semaphore
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SemaphoreConfig {
    /// Resource the permits guard
    pub resource: ResourceName,
    /// Desired capacity; `None` joins whatever pool already exists
    #[serde(default)]
    pub capacity: Option<u64>,
    pub broker: BrokerConfig,
}

impl SemaphoreConfig {
    pub fn new(resource: ResourceName, broker: BrokerConfig) -> Self {
        Self {
            resource,
            capacity: None,
            broker,
        }
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.host.trim().is_empty() {
            return Err(ConfigError::Invalid("broker host is empty".into()));
        }
        if self.broker.port == 0 || self.broker.admin_port == 0 {
            return Err(ConfigError::Invalid("broker ports must be non-zero".into()));
        }
        if self.broker.virtual_host.is_empty() {
            return Err(ConfigError::Invalid("virtual host is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "semaphore_tests.rs"]
mod tests;
