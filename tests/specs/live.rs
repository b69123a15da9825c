// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live broker specs
//!
//! Run against a real RabbitMQ with the management plugin:
//!
//! ```text
//! QSEM_TEST_CONFIG=qsem.toml cargo test --test specs -- --ignored
//! ```
//!
//! Each scenario resizes and finally destroys the configured resource, so point
//! the config at a throwaway resource name.

use crate::prelude::*;
use qsem::{AmqpSemaphore, SemaphoreConfig};

fn config(capacity: Option<u64>) -> SemaphoreConfig {
    let path = std::env::var("QSEM_TEST_CONFIG").expect("QSEM_TEST_CONFIG must name a config file");
    let mut config = SemaphoreConfig::load(path).unwrap();
    config.capacity = capacity;
    config
}

/// Management API statistics refresh every few seconds
async fn settle() {
    tokio::time::sleep(Duration::from_secs(6)).await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a running broker"]
async fn live_acquire_release_and_resize() {
    let mut owner = AmqpSemaphore::connect(&config(Some(2))).await.unwrap();
    settle().await;
    let mut joiner = AmqpSemaphore::connect(&config(None)).await.unwrap();
    assert_eq!(joiner.capacity(), Some(2));

    let first = owner.acquire().await.unwrap();
    let second = joiner.acquire().await.unwrap();
    assert!(matches!(
        joiner.acquire_timeout(Duration::from_secs(2)).await,
        Err(SemaphoreError::Timeout(_))
    ));

    owner.release(first).await.unwrap();
    let third = joiner
        .acquire_timeout(Duration::from_secs(10))
        .await
        .unwrap();

    settle().await;
    owner.resize(3).await.unwrap();
    settle().await;
    assert_eq!(owner.current_capacity().await.unwrap(), 3);

    joiner.release(second).await.unwrap();
    joiner.release(third).await.unwrap();
    owner.destroy().await.unwrap();
    joiner.disconnect().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a running broker"]
async fn live_disconnect_requeues_permits() {
    let mut owner = AmqpSemaphore::connect(&config(Some(1))).await.unwrap();
    settle().await;
    let mut other = AmqpSemaphore::connect(&config(None)).await.unwrap();

    let _held = owner.acquire().await.unwrap();
    owner.disconnect().await.unwrap();

    let handle = other
        .acquire_timeout(Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(handle.session(), other.session_id());
    other.destroy().await.unwrap();
}
