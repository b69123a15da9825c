// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the broker: token queue (data plane) and capacity probe

pub mod probe;
pub mod queue;
pub mod traced;

pub use probe::{CapacityProbe, HttpCapacityProbe, ObservedDepth, ProbeError};
pub use queue::{AmqpTokenQueue, ConsumerPriority, QueueError, TokenQueue};
pub use traced::{TracedCapacityProbe, TracedTokenQueue};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use probe::FakeCapacityProbe;
#[cfg(any(test, feature = "test-support"))]
pub use queue::{FakeBroker, FakeTokenQueue, QueueCall};
