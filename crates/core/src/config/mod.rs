// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration modules

mod broker;
mod semaphore;

pub use broker::{BrokerConfig, DEFAULT_ADMIN_PORT, DEFAULT_PORT, DEFAULT_VIRTUAL_HOST};
pub use semaphore::SemaphoreConfig;

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
