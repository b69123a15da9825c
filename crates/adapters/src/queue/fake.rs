// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory broker for testing
//!
//! Mirrors the broker behavior the semaphore relies on: one delivery per
//! ready token, consumer priority then arrival order among waiters, and
//! requeue of every unacknowledged token when a session goes away.
//! Channel-level failures match RabbitMQ too: an unknown delivery tag or a
//! consume on a missing queue closes the session, while settling a tag whose
//! queue was deleted succeeds and does nothing.
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ConsumerPriority, QueueError, TokenQueue};
use async_trait::async_trait;
use qsem_core::{DeliveryTag, IdGen, QueueName, SequentialIdGen, SessionId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

/// Recorded token queue call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueCall {
    Declare,
    Publish,
    SetPrefetch { count: u16 },
    Consume { priority: ConsumerPriority },
    Ack { tag: DeliveryTag },
    Reject { tag: DeliveryTag },
    Delete,
    Close,
}

type DeliveryResult = Result<DeliveryTag, QueueError>;

struct Waiter {
    seq: u64,
    session: SessionId,
    priority: ConsumerPriority,
    tx: oneshot::Sender<DeliveryResult>,
}

#[derive(Default)]
struct QueueState {
    ready: u64,
    waiters: Vec<Waiter>,
}

struct SessionState {
    queue: QueueName,
    open: bool,
    next_tag: u64,
    prefetch: Option<u16>,
    unacked: HashSet<DeliveryTag>,
    /// Held when the queue was deleted; settling them is a no-op
    orphaned: HashSet<DeliveryTag>,
    reject_failure: Option<String>,
    calls: Vec<QueueCall>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<QueueName, QueueState>,
    sessions: HashMap<SessionId, SessionState>,
    next_waiter: u64,
}

impl BrokerState {
    fn session_mut(&mut self, id: &SessionId) -> Result<&mut SessionState, QueueError> {
        match self.sessions.get_mut(id) {
            Some(session) if session.open => Ok(session),
            _ => Err(QueueError::Closed(format!("session {} is closed", id))),
        }
    }

    fn record(&mut self, id: &SessionId, call: QueueCall) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.calls.push(call);
        }
    }

    fn unacknowledged(&self, queue: &QueueName) -> u64 {
        self.sessions
            .values()
            .filter(|s| s.open && &s.queue == queue)
            .map(|s| s.unacked.len() as u64)
            .sum()
    }

    /// Hand ready tokens to waiters: highest priority first, then arrival order
    fn dispatch(&mut self, queue_name: &QueueName) {
        loop {
            let Some(queue) = self.queues.get_mut(queue_name) else {
                return;
            };
            if queue.ready == 0 || queue.waiters.is_empty() {
                return;
            }

            let mut best = 0;
            for (i, waiter) in queue.waiters.iter().enumerate() {
                let current = &queue.waiters[best];
                if waiter.priority > current.priority
                    || (waiter.priority == current.priority && waiter.seq < current.seq)
                {
                    best = i;
                }
            }
            let waiter = queue.waiters.remove(best);

            let Some(session) = self.sessions.get_mut(&waiter.session) else {
                continue;
            };
            if !session.open {
                continue;
            }
            session.next_tag += 1;
            let tag = DeliveryTag(session.next_tag);

            if waiter.tx.send(Ok(tag)).is_ok() {
                session.unacked.insert(tag);
                if let Some(queue) = self.queues.get_mut(queue_name) {
                    queue.ready -= 1;
                }
            }
        }
    }

    fn requeue(&mut self, id: &SessionId, tag: DeliveryTag) {
        let Some(session) = self.sessions.get_mut(id) else {
            return;
        };
        if !session.unacked.remove(&tag) {
            return;
        }
        let queue_name = session.queue.clone();
        if let Some(queue) = self.queues.get_mut(&queue_name) {
            queue.ready += 1;
        }
        self.dispatch(&queue_name);
    }

    /// Connection loss: every unacknowledged token goes back to the queue
    fn disconnect(&mut self, id: &SessionId) {
        let Some(session) = self.sessions.get_mut(id) else {
            return;
        };
        if !session.open {
            return;
        }
        session.open = false;
        let returned = std::mem::take(&mut session.unacked).len() as u64;
        let queue_name = session.queue.clone();

        if let Some(queue) = self.queues.get_mut(&queue_name) {
            queue.ready += returned;
            let (gone, kept): (Vec<_>, Vec<_>) =
                queue.waiters.drain(..).partition(|w| &w.session == id);
            queue.waiters = kept;
            for waiter in gone {
                let _ = waiter
                    .tx
                    .send(Err(QueueError::Closed(format!("session {} closed", id))));
            }
        }
        self.dispatch(&queue_name);
    }

    /// Unknown delivery tags close the channel, as the broker does
    fn unknown_tag(&mut self, id: &SessionId, tag: DeliveryTag) -> QueueError {
        self.disconnect(id);
        QueueError::Protocol(format!("PRECONDITION_FAILED - unknown delivery tag {}", tag))
    }
}

/// Shared in-memory broker
///
/// Every [`FakeTokenQueue`] connected through the same broker sees the same
/// queues, like separate processes talking to one RabbitMQ.
#[derive(Clone)]
pub struct FakeBroker {
    state: Arc<Mutex<BrokerState>>,
    ids: SequentialIdGen,
}

impl Default for FakeBroker {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            ids: SequentialIdGen::new("fake-session"),
        }
    }
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a new session bound to `queue`
    pub fn connect(&self, queue: QueueName) -> FakeTokenQueue {
        let id = self.ids.next();
        self.lock().sessions.insert(
            id.clone(),
            SessionState {
                queue: queue.clone(),
                open: true,
                next_tag: 0,
                prefetch: None,
                unacked: HashSet::new(),
                orphaned: HashSet::new(),
                reject_failure: None,
                calls: Vec::new(),
            },
        );
        FakeTokenQueue {
            session: Arc::new(SessionGuard {
                broker: self.clone(),
                id,
                queue,
            }),
        }
    }

    pub fn queue_exists(&self, queue: &QueueName) -> bool {
        self.lock().queues.contains_key(queue)
    }

    /// Ready and unacknowledged counts, `None` when the queue does not exist
    pub fn depth(&self, queue: &QueueName) -> Option<(u64, u64)> {
        let state = self.lock();
        let ready = state.queues.get(queue)?.ready;
        Some((ready, state.unacknowledged(queue)))
    }

    /// Number of consumers currently waiting on `queue`
    pub fn waiting(&self, queue: &QueueName) -> usize {
        self.lock()
            .queues
            .get(queue)
            .map(|q| q.waiters.len())
            .unwrap_or(0)
    }
}

/// Closes the session when the last clone of the adapter goes away
struct SessionGuard {
    broker: FakeBroker,
    id: SessionId,
    queue: QueueName,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.broker.lock().disconnect(&self.id);
    }
}

/// One session on the in-memory broker
#[derive(Clone)]
pub struct FakeTokenQueue {
    session: Arc<SessionGuard>,
}

impl FakeTokenQueue {
    fn broker(&self) -> &FakeBroker {
        &self.session.broker
    }

    fn id(&self) -> &SessionId {
        &self.session.id
    }

    fn queue(&self) -> &QueueName {
        &self.session.queue
    }

    /// Get all recorded calls for this session
    pub fn calls(&self) -> Vec<QueueCall> {
        self.broker()
            .lock()
            .sessions
            .get(self.id())
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    /// Last prefetch limit set on this session
    pub fn prefetch(&self) -> Option<u16> {
        self.broker()
            .lock()
            .sessions
            .get(self.id())
            .and_then(|s| s.prefetch)
    }

    /// Make the next reject fail with a protocol error, leaving the session open
    pub fn fail_next_reject(&self, message: impl Into<String>) {
        if let Some(session) = self.broker().lock().sessions.get_mut(self.id()) {
            session.reject_failure = Some(message.into());
        }
    }

    /// Drop the connection without closing it cleanly, as a crashed process would
    pub fn kill(&self) {
        self.broker().lock().disconnect(self.id());
    }
}

#[async_trait]
impl TokenQueue for FakeTokenQueue {
    fn session_id(&self) -> &SessionId {
        self.id()
    }

    fn is_open(&self) -> bool {
        self.broker()
            .lock()
            .sessions
            .get(self.id())
            .is_some_and(|s| s.open)
    }

    async fn declare(&self) -> Result<(), QueueError> {
        let mut state = self.broker().lock();
        state.record(self.id(), QueueCall::Declare);
        state.session_mut(self.id())?;
        state.queues.entry(self.queue().clone()).or_default();
        Ok(())
    }

    async fn publish(&self) -> Result<(), QueueError> {
        let mut state = self.broker().lock();
        state.record(self.id(), QueueCall::Publish);
        state.session_mut(self.id())?;
        // Unroutable publishes are dropped silently by the default exchange
        if let Some(queue) = state.queues.get_mut(self.queue()) {
            queue.ready += 1;
        }
        state.dispatch(self.queue());
        Ok(())
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), QueueError> {
        let mut state = self.broker().lock();
        state.record(self.id(), QueueCall::SetPrefetch { count });
        state.session_mut(self.id())?.prefetch = Some(count);
        Ok(())
    }

    async fn consume(&self, priority: ConsumerPriority) -> Result<DeliveryTag, QueueError> {
        let pending = {
            let mut state = self.broker().lock();
            state.record(self.id(), QueueCall::Consume { priority });
            state.session_mut(self.id())?;

            state.next_waiter += 1;
            let seq = state.next_waiter;
            let (tx, rx) = oneshot::channel();
            if !state.queues.contains_key(self.queue()) {
                // A 404 on consume closes the channel
                state.disconnect(self.id());
                return Err(QueueError::Closed(format!(
                    "NOT_FOUND - no queue '{}'",
                    self.queue()
                )));
            }
            let waiter = Waiter {
                seq,
                session: self.id().clone(),
                priority,
                tx,
            };
            if let Some(queue) = state.queues.get_mut(self.queue()) {
                queue.waiters.push(waiter);
            }
            state.dispatch(self.queue());

            PendingWait {
                broker: self.broker().clone(),
                session: self.id().clone(),
                queue: self.queue().clone(),
                seq,
                rx: Some(rx),
            }
        };

        pending.recv().await
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), QueueError> {
        let mut state = self.broker().lock();
        state.record(self.id(), QueueCall::Ack { tag });
        let session = state.session_mut(self.id())?;
        if session.orphaned.remove(&tag) {
            return Ok(());
        }
        if !session.unacked.remove(&tag) {
            return Err(state.unknown_tag(self.id(), tag));
        }
        Ok(())
    }

    async fn reject(&self, tag: DeliveryTag) -> Result<(), QueueError> {
        let mut state = self.broker().lock();
        state.record(self.id(), QueueCall::Reject { tag });
        let session = state.session_mut(self.id())?;
        if let Some(message) = session.reject_failure.take() {
            return Err(QueueError::Protocol(message));
        }
        if session.orphaned.remove(&tag) {
            return Ok(());
        }
        if !session.unacked.contains(&tag) {
            return Err(state.unknown_tag(self.id(), tag));
        }
        state.requeue(self.id(), tag);
        Ok(())
    }

    async fn delete(&self) -> Result<(), QueueError> {
        let mut state = self.broker().lock();
        state.record(self.id(), QueueCall::Delete);
        state.session_mut(self.id())?;

        let queue_name = self.queue().clone();
        if let Some(queue) = state.queues.remove(&queue_name) {
            for waiter in queue.waiters {
                let _ = waiter.tx.send(Err(QueueError::Cancelled(format!(
                    "queue {} deleted",
                    queue_name
                ))));
            }
        }
        // Held tokens die with the queue; their tags stay valid on the channel
        for session in state.sessions.values_mut() {
            if session.queue == queue_name {
                let held = std::mem::take(&mut session.unacked);
                session.orphaned.extend(held);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        let mut state = self.broker().lock();
        state.record(self.id(), QueueCall::Close);
        state.disconnect(self.id());
        Ok(())
    }
}

/// A registered waiter; requeues a token that arrives after the wait is abandoned
struct PendingWait {
    broker: FakeBroker,
    session: SessionId,
    queue: QueueName,
    seq: u64,
    rx: Option<oneshot::Receiver<DeliveryResult>>,
}

impl PendingWait {
    async fn recv(mut self) -> DeliveryResult {
        let Some(rx) = self.rx.as_mut() else {
            return Err(QueueError::Cancelled("wait already finished".into()));
        };
        let result = rx.await;
        self.rx = None;
        match result {
            Ok(delivery) => delivery,
            Err(_) => Err(QueueError::Cancelled(format!(
                "consumer on {} cancelled",
                self.queue
            ))),
        }
    }
}

impl Drop for PendingWait {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        let mut state = self.broker.lock();
        if let Some(queue) = state.queues.get_mut(&self.queue) {
            if let Some(pos) = queue.waiters.iter().position(|w| w.seq == self.seq) {
                queue.waiters.remove(pos);
                return;
            }
        }
        rx.close();
        if let Ok(Ok(tag)) = rx.try_recv() {
            state.requeue(&self.session, tag);
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
