// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery specs
//!
//! Permits held by a client that goes away return to the pool.

use crate::prelude::*;

#[tokio::test]
async fn dropped_holder_returns_its_permit_to_a_waiter() {
    let pool = Pool::new("crash");
    let mut holder = pool.client(Some(1)).await;
    let mut waiter = pool.client(None).await;
    let _handle = holder.acquire().await.unwrap();

    let waiting = tokio::spawn(async move {
        let handle = waiter.acquire().await.unwrap();
        (handle, waiter)
    });
    pool.until_waiting(1).await;

    drop(holder);

    let (handle, waiter) = waiting.await.unwrap();
    assert_eq!(handle.session(), waiter.session_id());
    assert_eq!(pool.depth(), (0, 1));
}

#[tokio::test]
async fn disconnect_returns_every_held_permit() {
    let pool = Pool::new("leave");
    let mut client = pool.client(Some(3)).await;
    for _ in 0..3 {
        client.acquire().await.unwrap();
    }
    assert_eq!(pool.depth(), (0, 3));

    client.disconnect().await.unwrap();

    assert_eq!(client.state(), ClientState::Disconnected);
    assert_eq!(pool.depth(), (3, 0));
}

#[tokio::test]
async fn pool_outlives_the_client_that_created_it() {
    let pool = Pool::new("durable");
    let mut creator = pool.client(Some(2)).await;
    creator.disconnect().await.unwrap();

    let joiner = pool.client(None).await;

    assert_eq!(joiner.capacity(), Some(2));
}

#[tokio::test]
async fn destroyed_pool_cannot_be_joined_without_capacity() {
    let pool = Pool::new("gone");
    let mut owner = pool.client(Some(2)).await;
    owner.destroy().await.unwrap();

    let err = pool.try_client(None).await.err().unwrap();

    assert!(matches!(err, SemaphoreError::EmptyInitialization { .. }));
}
