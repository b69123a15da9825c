// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capacity probes
//!
//! AMQP has no primitive that reports ready plus unacknowledged messages,
//! so the total permit count is read out of band from the broker's
//! management API.

mod http;

pub use http::HttpCapacityProbe;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeCapacityProbe;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from capacity probes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("management api unreachable: {0}")]
    Unreachable(String),
    #[error("management api rejected credentials")]
    Unauthorized,
    #[error("queue not found: {0}")]
    QueueNotFound(String),
    #[error("management api returned status {0}")]
    Status(u16),
    #[error("malformed management api response: {0}")]
    Malformed(String),
}

/// Point-in-time token counts for one queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObservedDepth {
    /// Tokens waiting in the queue
    pub ready: u64,
    /// Tokens delivered and held, not yet acknowledged
    pub unacknowledged: u64,
}

impl ObservedDepth {
    pub fn new(ready: u64, unacknowledged: u64) -> Self {
        Self {
            ready,
            unacknowledged,
        }
    }

    /// Total permits in the pool, idle or held
    pub fn total(&self) -> u64 {
        self.ready + self.unacknowledged
    }
}

/// Reads the current permit count of one resource queue
///
/// Every call is a fresh read; implementations must not cache.
#[async_trait]
pub trait CapacityProbe: Send + Sync + 'static {
    async fn depth(&self) -> Result<ObservedDepth, ProbeError>;
}
