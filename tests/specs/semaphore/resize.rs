// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resize specs

use crate::prelude::*;

#[tokio::test]
async fn growth_wakes_a_waiting_client() {
    let pool = Pool::new("grow");
    let mut holder = pool.client(Some(1)).await;
    let mut waiter = pool.client(None).await;
    let mut admin = pool.client(None).await;
    let _handle = holder.acquire().await.unwrap();

    let waiting = tokio::spawn(async move {
        let acquired = waiter.acquire().await.is_ok();
        (acquired, waiter)
    });
    pool.until_waiting(1).await;

    admin.resize(2).await.unwrap();

    let (acquired, _waiter) = waiting.await.unwrap();
    assert!(acquired);
    assert_eq!(admin.current_capacity().await.unwrap(), 2);
    assert_eq!(pool.depth(), (0, 2));
}

#[tokio::test]
async fn shrink_reaches_the_requested_size() {
    let pool = Pool::new("shrink");
    let mut client = pool.client(Some(10)).await;

    client.resize(4).await.unwrap();

    assert_eq!(client.state(), ClientState::Synced { capacity: 4 });
    assert_eq!(pool.depth(), (4, 0));
}

#[tokio::test(start_paused = true)]
async fn shrink_to_zero_blocks_acquirers() {
    let pool = Pool::new("drain");
    let mut client = pool.client(Some(2)).await;

    client.resize(0).await.unwrap();

    assert!(matches!(
        client.acquire_timeout(Duration::from_secs(1)).await,
        Err(SemaphoreError::Timeout(_))
    ));
    assert_eq!(pool.depth(), (0, 0));
}

#[tokio::test]
async fn shrink_waits_for_held_permits() {
    let pool = Pool::new("shrink-held");
    let mut holder = pool.client(Some(2)).await;
    let mut admin = pool.client(None).await;
    let first = holder.acquire().await.unwrap();
    let second = holder.acquire().await.unwrap();

    let resizing = tokio::spawn(async move {
        admin.resize(1).await.unwrap();
        admin
    });
    pool.until_waiting(1).await;

    holder.release(first).await.unwrap();
    let admin = resizing.await.unwrap();

    assert_eq!(admin.capacity(), Some(1));
    assert_eq!(pool.depth(), (0, 1));
    holder.release(second).await.unwrap();
    assert_eq!(pool.depth(), (1, 0));
}

#[tokio::test]
async fn repeating_a_resize_conflicts() {
    let pool = Pool::new("conflict");
    let mut first = pool.client(Some(1)).await;
    let mut second = pool.client(None).await;

    first.resize(3).await.unwrap();

    assert!(matches!(
        second.resize(3).await,
        Err(SemaphoreError::CapacityConflict { capacity: 3, .. })
    ));
    assert_eq!(pool.depth(), (3, 0));
}
