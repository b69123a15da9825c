// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for semaphore specs

pub use qsem::{ClientState, Handle, ResourceName, SemaphoreClient, SemaphoreError};
pub use qsem_adapters::{FakeBroker, FakeCapacityProbe, FakeTokenQueue};
pub use std::time::Duration;
pub use tokio::time::Instant;

pub type FakeClient = SemaphoreClient<FakeTokenQueue, FakeCapacityProbe>;

/// One named resource on a shared in-memory broker
pub struct Pool {
    broker: FakeBroker,
    resource: ResourceName,
}

impl Pool {
    pub fn new(name: &str) -> Self {
        Self {
            broker: FakeBroker::new(),
            resource: ResourceName::new(name).unwrap(),
        }
    }

    /// Open a client the way a fresh process would
    pub async fn try_client(&self, capacity: Option<u64>) -> Result<FakeClient, SemaphoreError> {
        let queue_name = self.resource.queue_name();
        let queue = self.broker.connect(queue_name.clone());
        let probe = FakeCapacityProbe::new(self.broker.clone(), queue_name);
        SemaphoreClient::with_adapters(self.resource.clone(), queue, probe, capacity).await
    }

    pub async fn client(&self, capacity: Option<u64>) -> FakeClient {
        self.try_client(capacity).await.unwrap()
    }

    /// (ready, held) token counts
    pub fn depth(&self) -> (u64, u64) {
        self.broker
            .depth(&self.resource.queue_name())
            .unwrap_or((0, 0))
    }

    pub fn waiting(&self) -> usize {
        self.broker.waiting(&self.resource.queue_name())
    }

    /// Yield until `count` consumers are parked on the queue
    ///
    /// Yielding keeps the runtime busy, so paused time does not advance.
    pub async fn until_waiting(&self, count: usize) {
        while self.waiting() < count {
            tokio::task::yield_now().await;
        }
    }

    /// Yield until `count` tokens are held
    pub async fn until_held(&self, count: u64) {
        while self.depth().1 < count {
            tokio::task::yield_now().await;
        }
    }
}
