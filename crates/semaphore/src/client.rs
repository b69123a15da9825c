// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semaphore client
//!
//! Permits are tokens in a durable broker queue. Acquiring consumes one token
//! without acknowledging it; releasing rejects it back into the queue. The
//! broker's single-delivery guarantee is the only mutual exclusion, and its
//! requeue-on-disconnect is the only recovery path for a crashed holder.
//!
//! ## Resizing
//!
//! Capacity changes are computed against a depth snapshot from the capacity
//! probe and applied one token at a time. They are not atomic:
//! - a resize that targets the observed capacity fails with
//!   [`SemaphoreError::CapacityConflict`], so two resizers reading the same
//!   stale snapshot cannot silently compound
//! - shrinking consumes tokens at a higher consumer priority than
//!   acquirers, so it wins ready tokens a waiter would otherwise receive
//! - a failure part way leaves the tokens already published or removed in
//!   place and drops the client back to [`ClientState::Connected`]

use crate::error::SemaphoreError;
use crate::resize::ResizePlan;
use qsem_adapters::{
    AmqpTokenQueue, CapacityProbe, ConsumerPriority, HttpCapacityProbe, TokenQueue,
    TracedCapacityProbe, TracedTokenQueue,
};
use qsem_core::{DeliveryTag, Handle, ResourceName, SemaphoreConfig, SessionId};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

/// Client over a real RabbitMQ broker, with traced adapters
pub type AmqpSemaphore = SemaphoreClient<
    TracedTokenQueue<AmqpTokenQueue>,
    TracedCapacityProbe<HttpCapacityProbe>,
>;

/// Client view of its relationship with the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Session closed; terminal
    Disconnected,
    /// Session open, capacity not known
    Connected,
    /// Session open, capacity last set or observed at `capacity`
    Synced { capacity: u64 },
}

/// One process's session on a distributed semaphore
pub struct SemaphoreClient<Q, P> {
    resource: ResourceName,
    queue: Q,
    probe: P,
    state: ClientState,
    held: HashSet<DeliveryTag>,
}

impl AmqpSemaphore {
    /// Connect to the broker described by `config` and join or create the pool
    pub async fn connect(config: &SemaphoreConfig) -> Result<Self, SemaphoreError> {
        config.validate()?;

        let queue_name = config.resource.queue_name();
        let queue = AmqpTokenQueue::connect(&config.broker, queue_name.clone()).await?;
        let probe = HttpCapacityProbe::new(&config.broker, &queue_name);

        Self::with_adapters(
            config.resource.clone(),
            TracedTokenQueue::new(queue),
            TracedCapacityProbe::new(probe),
            config.capacity,
        )
        .await
    }
}

impl<Q, P> SemaphoreClient<Q, P>
where
    Q: TokenQueue,
    P: CapacityProbe,
{
    /// Join or create the pool for `resource` over an open session
    ///
    /// With `desired` unset the client joins the existing pool and fails with
    /// [`SemaphoreError::EmptyInitialization`] when there is none. With
    /// `desired` set the pool is resized to it unless it already matches.
    pub async fn with_adapters(
        resource: ResourceName,
        queue: Q,
        probe: P,
        desired: Option<u64>,
    ) -> Result<Self, SemaphoreError> {
        let mut client = Self {
            resource,
            queue,
            probe,
            state: ClientState::Connected,
            held: HashSet::new(),
        };

        if let Err(e) = client.initialize(desired).await {
            // Don't leave a half-initialized session behind
            let _ = client.queue.close().await;
            return Err(e);
        }

        Ok(client)
    }

    async fn initialize(&mut self, desired: Option<u64>) -> Result<(), SemaphoreError> {
        self.ensure_open()?;
        self.queue.declare().await?;

        let observed = self.probe.depth().await?.total();
        match desired {
            None if observed == 0 => Err(SemaphoreError::EmptyInitialization {
                resource: self.resource.clone(),
            }),
            Some(capacity) if capacity == observed => {
                tracing::info!(resource = %self.resource, capacity, "joined pool");
                self.state = ClientState::Synced { capacity };
                Ok(())
            }
            None => {
                tracing::info!(resource = %self.resource, capacity = observed, "joined pool");
                self.state = ClientState::Synced { capacity: observed };
                Ok(())
            }
            Some(capacity) => self.apply_resize(capacity, observed).await,
        }
    }

    pub fn resource(&self) -> &ResourceName {
        &self.resource
    }

    pub fn session_id(&self) -> &SessionId {
        self.queue.session_id()
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Capacity as of the last successful sync or resize
    pub fn capacity(&self) -> Option<u64> {
        match self.state {
            ClientState::Synced { capacity } => Some(capacity),
            _ => None,
        }
    }

    /// Number of permits this client currently holds
    pub fn held(&self) -> usize {
        self.held.len()
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    fn ensure_open(&self) -> Result<(), SemaphoreError> {
        if self.state == ClientState::Disconnected {
            return Err(SemaphoreError::Connection(format!(
                "client for {} is disconnected",
                self.resource
            )));
        }
        if !self.queue.is_open() {
            return Err(SemaphoreError::Connection(format!(
                "session {} is closed, reconnect to continue",
                self.queue.session_id()
            )));
        }
        Ok(())
    }

    /// Live pool size: ready plus held tokens
    pub async fn current_capacity(&self) -> Result<u64, SemaphoreError> {
        Ok(self.probe.depth().await?.total())
    }

    /// Change the pool to `desired` permits
    pub async fn resize(&mut self, desired: u64) -> Result<(), SemaphoreError> {
        self.ensure_open()?;
        let current = self.probe.depth().await?.total();
        self.apply_resize(desired, current).await
    }

    async fn apply_resize(&mut self, desired: u64, current: u64) -> Result<(), SemaphoreError> {
        let plan = ResizePlan::between(current, desired);
        let result = match plan {
            ResizePlan::Unchanged => {
                return Err(SemaphoreError::CapacityConflict {
                    resource: self.resource.clone(),
                    capacity: current,
                })
            }
            ResizePlan::Grow(count) => self.grow(count).await,
            ResizePlan::Shrink(count) => self.shrink(count).await,
        };

        match result {
            Ok(()) => {
                tracing::info!(resource = %self.resource, current, desired, "resized");
                self.state = ClientState::Synced { capacity: desired };
                Ok(())
            }
            Err((applied, e)) => {
                tracing::warn!(
                    resource = %self.resource,
                    current,
                    desired,
                    applied,
                    remaining = plan.steps() - applied,
                    error = %e,
                    "resize interrupted"
                );
                self.state = ClientState::Connected;
                Err(e)
            }
        }
    }

    async fn grow(&self, count: u64) -> Result<(), (u64, SemaphoreError)> {
        for applied in 0..count {
            self.queue.publish().await.map_err(|e| (applied, e.into()))?;
        }
        Ok(())
    }

    async fn shrink(&self, count: u64) -> Result<(), (u64, SemaphoreError)> {
        self.queue.set_prefetch(1).await.map_err(|e| (0, e.into()))?;
        for applied in 0..count {
            let tag = self
                .queue
                .consume(ConsumerPriority::SHRINK)
                .await
                .map_err(|e| (applied, e.into()))?;
            self.queue.ack(tag).await.map_err(|e| (applied, e.into()))?;
        }
        Ok(())
    }

    /// Wait for a permit
    ///
    /// Dropping the returned future abandons the wait without losing a token.
    pub async fn acquire(&mut self) -> Result<Handle, SemaphoreError> {
        self.ensure_open()?;
        self.queue.set_prefetch(1).await?;

        let start = Instant::now();
        let tag = self.queue.consume(ConsumerPriority::NORMAL).await?;
        self.held.insert(tag);

        let handle = Handle::new(self.queue.session_id().clone(), tag);
        tracing::info!(
            resource = %self.resource,
            %handle,
            waited_ms = start.elapsed().as_millis() as u64,
            "permit acquired"
        );
        Ok(handle)
    }

    /// Wait at most `timeout` for a permit
    pub async fn acquire_timeout(&mut self, timeout: Duration) -> Result<Handle, SemaphoreError> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(resource = %self.resource, ?timeout, "acquire timed out");
                Err(SemaphoreError::Timeout(timeout))
            }
        }
    }

    /// Return a permit to the pool
    pub async fn release(&mut self, handle: Handle) -> Result<(), SemaphoreError> {
        self.ensure_open()?;
        if handle.session() != self.queue.session_id() || !self.held.contains(&handle.tag()) {
            return Err(SemaphoreError::InvalidHandle(handle));
        }

        self.queue.reject(handle.tag()).await?;
        self.held.remove(&handle.tag());
        tracing::info!(resource = %self.resource, %handle, "permit released");
        Ok(())
    }

    /// Delete the pool, including held tokens, and close the session
    pub async fn destroy(&mut self) -> Result<(), SemaphoreError> {
        self.ensure_open()?;
        self.queue.delete().await?;
        tracing::info!(resource = %self.resource, "pool destroyed");
        self.finish().await
    }

    /// Close the session; permits still held are requeued by the broker
    pub async fn disconnect(&mut self) -> Result<(), SemaphoreError> {
        if self.state == ClientState::Disconnected {
            return Ok(());
        }
        if !self.held.is_empty() {
            tracing::warn!(
                resource = %self.resource,
                held = self.held.len(),
                "disconnecting with permits held"
            );
        }
        self.finish().await
    }

    async fn finish(&mut self) -> Result<(), SemaphoreError> {
        let closed = self.queue.close().await;
        self.state = ClientState::Disconnected;
        self.held.clear();
        closed?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
