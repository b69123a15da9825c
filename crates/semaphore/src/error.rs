// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the semaphore client

use qsem_adapters::{ProbeError, QueueError};
use qsem_core::{ConfigError, Handle, ResourceName};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by [`SemaphoreClient`](crate::SemaphoreClient)
///
/// Nothing here is retried internally; reconnecting is up to the caller.
#[derive(Debug, Error)]
pub enum SemaphoreError {
    #[error("broker session unavailable: {0}")]
    Connection(String),
    #[error("no capacity given and no existing pool for {resource}")]
    EmptyInitialization { resource: ResourceName },
    #[error(
        "capacity of {resource} is already {capacity}; \
         check the value or wait for a concurrent resize to become visible"
    )]
    CapacityConflict { resource: ResourceName, capacity: u64 },
    #[error("capacity probe failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("handle {0} is not held by this client")]
    InvalidHandle(Handle),
    #[error("broker error: {0}")]
    Broker(QueueError),
    #[error("no permit within {0:?}")]
    Timeout(Duration),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<QueueError> for SemaphoreError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::ConnectFailed(_) | QueueError::Closed(_) => {
                SemaphoreError::Connection(err.to_string())
            }
            other => SemaphoreError::Broker(other),
        }
    }
}
