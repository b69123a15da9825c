// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! qsem-core: shared vocabulary for the queue-backed semaphore
//!
//! This crate provides:
//! - Configuration for the broker and the semaphore itself
//! - Resource and queue naming
//! - Session identifiers, delivery tags and permit handles

pub mod config;
pub mod id;
pub mod resource;
pub mod token;

pub use config::{BrokerConfig, ConfigError, SemaphoreConfig};
pub use id::{IdGen, SequentialIdGen, SessionId, UuidIdGen};
pub use resource::{QueueName, ResourceName, QUEUE_SUFFIX};
pub use token::{DeliveryTag, Handle, TOKEN_PAYLOAD};
