// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::probe::{CapacityProbe, ObservedDepth, ProbeError};
use crate::queue::{ConsumerPriority, QueueError, TokenQueue};
use async_trait::async_trait;
use qsem_core::{DeliveryTag, SessionId};
use tracing::Instrument;

/// Wrapper that adds tracing to any TokenQueue
#[derive(Clone)]
pub struct TracedTokenQueue<Q> {
    inner: Q,
}

impl<Q> TracedTokenQueue<Q> {
    pub fn new(inner: Q) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Q {
        &self.inner
    }
}

#[async_trait]
impl<Q: TokenQueue> TokenQueue for TracedTokenQueue<Q> {
    fn session_id(&self) -> &SessionId {
        self.inner.session_id()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn declare(&self) -> Result<(), QueueError> {
        let span = tracing::info_span!("queue.declare", session = %self.session_id());

        async {
            let result = self.inner.declare().await;
            match &result {
                Ok(()) => tracing::debug!("declared"),
                Err(e) => tracing::error!(error = %e, "declare failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn publish(&self) -> Result<(), QueueError> {
        let result = self.inner.publish().await;
        match &result {
            Ok(()) => tracing::trace!(session = %self.session_id(), "token published"),
            Err(e) => tracing::error!(session = %self.session_id(), error = %e, "publish failed"),
        }
        result
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), QueueError> {
        let result = self.inner.set_prefetch(count).await;
        tracing::trace!(session = %self.session_id(), count, ok = result.is_ok(), "prefetch set");
        result
    }

    async fn consume(&self, priority: ConsumerPriority) -> Result<DeliveryTag, QueueError> {
        let span = tracing::info_span!(
            "queue.consume",
            session = %self.session_id(),
            priority = priority.0
        );

        async {
            tracing::debug!("waiting for token");

            let start = std::time::Instant::now();
            let result = self.inner.consume(priority).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(tag) => tracing::debug!(
                    tag = tag.0,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "token delivered"
                ),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "consume failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), QueueError> {
        let result = self.inner.ack(tag).await;
        match &result {
            Ok(()) => tracing::trace!(session = %self.session_id(), tag = tag.0, "acked"),
            Err(e) => tracing::error!(
                session = %self.session_id(),
                tag = tag.0,
                error = %e,
                "ack failed"
            ),
        }
        result
    }

    async fn reject(&self, tag: DeliveryTag) -> Result<(), QueueError> {
        let result = self.inner.reject(tag).await;
        match &result {
            Ok(()) => tracing::trace!(session = %self.session_id(), tag = tag.0, "requeued"),
            Err(e) => tracing::error!(
                session = %self.session_id(),
                tag = tag.0,
                error = %e,
                "reject failed"
            ),
        }
        result
    }

    async fn delete(&self) -> Result<(), QueueError> {
        let span = tracing::info_span!("queue.delete", session = %self.session_id());

        async {
            let result = self.inner.delete().await;
            match &result {
                Ok(()) => tracing::info!("queue deleted"),
                Err(e) => tracing::error!(error = %e, "delete failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn close(&self) -> Result<(), QueueError> {
        let result = self.inner.close().await;
        // close() failing is often acceptable (connection already gone)
        match &result {
            Ok(()) => tracing::debug!(session = %self.session_id(), "session closed"),
            Err(e) => tracing::warn!(
                session = %self.session_id(),
                error = %e,
                "close failed (may be expected)"
            ),
        }
        result
    }
}

/// Wrapper that adds tracing to any CapacityProbe
#[derive(Clone)]
pub struct TracedCapacityProbe<P> {
    inner: P,
}

impl<P> TracedCapacityProbe<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: CapacityProbe> CapacityProbe for TracedCapacityProbe<P> {
    async fn depth(&self) -> Result<ObservedDepth, ProbeError> {
        let span = tracing::info_span!("probe.depth");

        async {
            let start = std::time::Instant::now();
            let result = self.inner.depth().await;
            let elapsed = start.elapsed();

            match &result {
                Ok(depth) => tracing::debug!(
                    ready = depth.ready,
                    unacknowledged = depth.unacknowledged,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "depth observed"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "probe failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
