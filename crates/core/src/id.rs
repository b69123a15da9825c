// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identifiers
//!
//! Every broker session gets a [`SessionId`] so that handles can be traced
//! back to the session that consumed them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies one open session with the broker
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates session identifiers
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> SessionId;
}

/// UUID-based generator for real broker sessions
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> SessionId {
        SessionId(uuid::Uuid::new_v4().to_string())
    }
}

/// Sequential generator, predictable ids for the in-memory broker
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("session")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> SessionId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        SessionId(format!("{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
