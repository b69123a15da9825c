// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake capacity probe reading the in-memory broker
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{CapacityProbe, ObservedDepth, ProbeError};
use crate::queue::FakeBroker;
use async_trait::async_trait;
use qsem_core::QueueName;
use std::sync::{Arc, Mutex};

/// Probe over a [`FakeBroker`], with injectable failures
#[derive(Clone)]
pub struct FakeCapacityProbe {
    broker: FakeBroker,
    queue: QueueName,
    failure: Arc<Mutex<Option<ProbeError>>>,
    reads: Arc<Mutex<u64>>,
}

impl FakeCapacityProbe {
    pub fn new(broker: FakeBroker, queue: QueueName) -> Self {
        Self {
            broker,
            queue,
            failure: Arc::new(Mutex::new(None)),
            reads: Arc::new(Mutex::new(0)),
        }
    }

    /// Make every following read fail with `error` until cleared
    pub fn fail_with(&self, error: ProbeError) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Number of reads served so far
    pub fn reads(&self) -> u64 {
        *self.reads.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CapacityProbe for FakeCapacityProbe {
    async fn depth(&self) -> Result<ObservedDepth, ProbeError> {
        *self.reads.lock().unwrap_or_else(|e| e.into_inner()) += 1;

        if let Some(error) = self
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(error);
        }

        match self.broker.depth(&self.queue) {
            Some((ready, unacknowledged)) => Ok(ObservedDepth::new(ready, unacknowledged)),
            None => Err(ProbeError::QueueNotFound(self.queue.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
