// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Distributed counting semaphore backed by a RabbitMQ queue
//!
//! Each permit is one message in a durable queue named after the resource.
//! Every process that wants to share the resource opens its own
//! [`SemaphoreClient`]; the broker arbitrates between them.

mod client;
mod error;
mod resize;

pub use client::{AmqpSemaphore, ClientState, SemaphoreClient};
pub use error::SemaphoreError;
pub use resize::ResizePlan;

pub use qsem_core::{BrokerConfig, ConfigError, Handle, ResourceName, SemaphoreConfig};
