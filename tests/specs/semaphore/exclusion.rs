// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutual exclusion specs
//!
//! At most `capacity` permits are held at once, across all clients.

use crate::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test(start_paused = true)]
async fn holders_never_exceed_capacity() {
    let pool = Pool::new("exclusion");
    let capacity = 2;
    let _owner = pool.client(Some(capacity as u64)).await;

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut workers = Vec::new();

    for _ in 0..6 {
        let mut client = pool.client(None).await;
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        workers.push(tokio::spawn(async move {
            for _ in 0..3 {
                let handle = client.acquire().await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                client.release(handle).await.unwrap();
            }
        }));
    }

    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), capacity);
    assert_eq!(pool.depth(), (capacity as u64, 0));
}

#[tokio::test(start_paused = true)]
async fn exhausted_pool_blocks_until_release() {
    let pool = Pool::new("exhausted");
    let mut holder = pool.client(Some(2)).await;
    let mut other = pool.client(None).await;
    let first = holder.acquire().await.unwrap();
    let _second = holder.acquire().await.unwrap();

    assert!(matches!(
        other.acquire_timeout(Duration::from_secs(30)).await,
        Err(SemaphoreError::Timeout(_))
    ));

    holder.release(first).await.unwrap();
    other
        .acquire_timeout(Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(pool.depth(), (0, 2));
}

#[tokio::test]
async fn handles_are_bound_to_their_client() {
    let pool = Pool::new("binding");
    let mut owner = pool.client(Some(1)).await;
    let mut thief = pool.client(None).await;
    let handle: Handle = owner.acquire().await.unwrap();

    assert!(matches!(
        thief.release(handle.clone()).await,
        Err(SemaphoreError::InvalidHandle(_))
    ));
    owner.release(handle.clone()).await.unwrap();
    assert!(matches!(
        owner.release(handle).await,
        Err(SemaphoreError::InvalidHandle(_))
    ));
    assert_eq!(pool.depth(), (1, 0));
}
