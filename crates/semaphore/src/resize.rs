// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resize planning

/// What it takes to move a pool from its observed size to a desired one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// Target equals the observed size; refused by the client
    Unchanged,
    /// Publish this many tokens
    Grow(u64),
    /// Consume and acknowledge this many tokens
    Shrink(u64),
}

impl ResizePlan {
    pub fn between(current: u64, desired: u64) -> Self {
        match current.cmp(&desired) {
            std::cmp::Ordering::Less => ResizePlan::Grow(desired - current),
            std::cmp::Ordering::Greater => ResizePlan::Shrink(current - desired),
            std::cmp::Ordering::Equal => ResizePlan::Unchanged,
        }
    }

    /// Number of single-token steps in the plan
    pub fn steps(&self) -> u64 {
        match *self {
            ResizePlan::Unchanged => 0,
            ResizePlan::Grow(n) | ResizePlan::Shrink(n) => n,
        }
    }
}

#[cfg(test)]
#[path = "resize_tests.rs"]
mod tests;
