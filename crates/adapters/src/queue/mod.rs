// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token queue adapters
//!
//! The token queue is the only data-plane contact with the broker. One
//! adapter value is one broker session bound to one resource queue.

mod amqp;

pub use amqp::AmqpTokenQueue;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBroker, FakeTokenQueue, QueueCall};

use async_trait::async_trait;
use qsem_core::{DeliveryTag, SessionId};
use thiserror::Error;

/// Errors from token queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to connect to broker: {0}")]
    ConnectFailed(String),
    #[error("session closed: {0}")]
    Closed(String),
    #[error("consumer cancelled by broker: {0}")]
    Cancelled(String),
    #[error("broker protocol error: {0}")]
    Protocol(String),
}

/// Broker-side consumer priority
///
/// Higher priority consumers are served first while they have spare
/// prefetch capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConsumerPriority(pub i32);

impl ConsumerPriority {
    pub const NORMAL: ConsumerPriority = ConsumerPriority(0);
    /// Used when removing surplus tokens during a shrink
    pub const SHRINK: ConsumerPriority = ConsumerPriority(9);
}

/// Adapter for one broker session on one resource queue
#[async_trait]
pub trait TokenQueue: Send + Sync + 'static {
    /// Session this adapter speaks for
    fn session_id(&self) -> &SessionId;

    /// Whether the session is still usable
    fn is_open(&self) -> bool;

    /// Declare the durable queue (idempotent)
    async fn declare(&self) -> Result<(), QueueError>;

    /// Publish one token
    async fn publish(&self) -> Result<(), QueueError>;

    /// Limit unacknowledged deliveries per consumer
    async fn set_prefetch(&self, count: u16) -> Result<(), QueueError>;

    /// Wait for exactly one token, then stop consuming
    ///
    /// Cancel safe: dropping the future, or failing after a delivery, requeues the token.
    async fn consume(&self, priority: ConsumerPriority) -> Result<DeliveryTag, QueueError>;

    /// Permanently remove a consumed token
    async fn ack(&self, tag: DeliveryTag) -> Result<(), QueueError>;

    /// Return a consumed token to the queue
    async fn reject(&self, tag: DeliveryTag) -> Result<(), QueueError>;

    /// Delete the queue with every token in it
    async fn delete(&self) -> Result<(), QueueError>;

    /// Close the session; unacknowledged tokens are requeued by the broker
    async fn close(&self) -> Result<(), QueueError>;
}
