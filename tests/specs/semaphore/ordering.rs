// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordering specs
//!
//! Waiters are served in arrival order.

use crate::prelude::*;

const HOLD: Duration = Duration::from_secs(5);
const SLACK: Duration = Duration::from_millis(500);

/// Acquire, hold for `HOLD`, release; returns how long the acquire waited
fn hold_once(mut client: FakeClient) -> tokio::task::JoinHandle<Duration> {
    tokio::spawn(async move {
        let start = Instant::now();
        let handle = client.acquire().await.unwrap();
        let waited = start.elapsed();
        tokio::time::sleep(HOLD).await;
        client.release(handle).await.unwrap();
        waited
    })
}

#[tokio::test(start_paused = true)]
async fn single_permit_serves_three_clients_in_turn() {
    let pool = Pool::new("ordering");
    let a = pool.client(Some(1)).await;
    let b = pool.client(None).await;
    let c = pool.client(None).await;

    let first = hold_once(a);
    pool.until_held(1).await;
    let second = hold_once(b);
    pool.until_waiting(1).await;
    let third = hold_once(c);
    pool.until_waiting(2).await;

    let first = first.await.unwrap();
    let second = second.await.unwrap();
    let third = third.await.unwrap();

    assert!(first < Duration::from_secs(1), "first waited {:?}", first);
    assert!(
        second >= Duration::from_secs(5) && second < Duration::from_secs(5) + SLACK,
        "second waited {:?}",
        second
    );
    assert!(
        third >= Duration::from_secs(10) && third < Duration::from_secs(10) + SLACK,
        "third waited {:?}",
        third
    );
    assert_eq!(pool.depth(), (1, 0));
}

#[tokio::test(start_paused = true)]
async fn abandoned_wait_does_not_lose_its_turn_to_a_token() {
    let pool = Pool::new("abandon");
    let mut holder = pool.client(Some(1)).await;
    let mut quitter = pool.client(None).await;
    let mut patient = pool.client(None).await;
    let handle = holder.acquire().await.unwrap();

    let err = quitter
        .acquire_timeout(Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, SemaphoreError::Timeout(_)));

    let waiting = tokio::spawn(async move {
        let handle = patient.acquire().await.unwrap();
        (handle, patient)
    });
    pool.until_waiting(1).await;
    holder.release(handle).await.unwrap();

    let (handle, patient) = waiting.await.unwrap();
    assert_eq!(handle.session(), patient.session_id());
    assert_eq!(patient.held(), 1);
    assert_eq!(quitter.held(), 0);
    assert_eq!(pool.depth(), (0, 1));
}
