// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use qsem_core::ResourceName;

fn queue() -> QueueName {
    ResourceName::new("testing").unwrap().queue_name()
}

#[test]
fn abandoned_wait_only_cancels() {
    let mut state = ConsumeState::started();

    assert_eq!(
        state.cleanup(),
        Cleanup {
            cancel: true,
            requeue: vec![],
        }
    );
}

#[test]
fn drop_during_cancel_requeues_delivery() {
    let mut state = ConsumeState::started();
    state.delivered(7);

    // Cancel round trip never finished
    assert_eq!(
        state.cleanup(),
        Cleanup {
            cancel: true,
            requeue: vec![7],
        }
    );
}

#[test]
fn failed_cancel_keeps_delivery_owed() {
    let mut state = ConsumeState::started();
    state.delivered(3);

    assert_eq!(state.complete(), None);
    assert_eq!(state.cleanup().requeue, vec![3]);
}

#[test]
fn unrequeued_surplus_blocks_completion() {
    let mut state = ConsumeState::started();
    state.delivered(1);
    state.cancelled();
    state.surplus(2);
    state.surplus(3);

    assert_eq!(state.complete(), None);
    assert_eq!(state.next_surplus(), Some(3));
    state.requeued(3);

    assert_eq!(
        state.cleanup(),
        Cleanup {
            cancel: false,
            requeue: vec![2, 1],
        }
    );
}

#[test]
fn completed_consume_owes_nothing() {
    let mut state = ConsumeState::started();
    state.delivered(5);
    state.cancelled();
    state.surplus(6);
    state.requeued(6);

    assert_eq!(state.complete(), Some(5));
    assert!(state.cleanup().is_empty());
}

#[test]
fn broker_cancel_before_delivery_owes_nothing() {
    let mut state = ConsumeState::started();
    state.cancelled();

    assert!(state.cleanup().is_empty());
}

#[test]
fn cleanup_is_taken_once() {
    let mut state = ConsumeState::started();
    state.delivered(9);

    assert!(!state.cleanup().is_empty());
    assert!(state.cleanup().is_empty());
}

#[test]
fn acked_publish_is_accepted() {
    assert!(check_confirmation(&queue(), Confirmation::Ack(None)).is_ok());
}

#[test]
fn nacked_publish_is_an_error() {
    let err = check_confirmation(&queue(), Confirmation::Nack(None)).unwrap_err();
    assert!(matches!(err, QueueError::Protocol(ref m) if m.contains("testing.semaphore")));
}

#[test]
fn unconfirmed_publish_is_an_error() {
    let err = check_confirmation(&queue(), Confirmation::NotRequested).unwrap_err();
    assert!(matches!(err, QueueError::Protocol(_)));
}
