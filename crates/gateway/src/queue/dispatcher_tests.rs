// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use sqlx::SqlitePool;

use locker_core::command::CommandPayload;
use locker_core::command::{CommandResult, CommandStatus};

use crate::queue::dispatcher::CommandDispatcher;

async fn test_dispatcher() -> CommandDispatcher {
    let pool = SqlitePool::connect("sqlite::memory:").await.expect("in-memory sqlite");
    sqlx::migrate!("./migrations").run(&pool).await.expect("run migrations");
    CommandDispatcher::new(pool, 3).with_backoff(10, 100)
}

fn open_locker(locker_id: i64) -> CommandPayload {
    CommandPayload::OpenLocker { locker_id, staff_user: None, reason: None }
}

#[tokio::test]
async fn enqueue_then_poll_claims_the_command_and_marks_it_in_flight() {
    let dispatcher = test_dispatcher().await;
    let command = dispatcher.enqueue("gym-main", open_locker(5)).await.unwrap();
    assert_eq!(command.status, CommandStatus::Pending);

    let claimed = dispatcher.poll("gym-main", 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].command_id, command.command_id);

    // A second poll before completion sees nothing: it's already in_flight.
    let claimed_again = dispatcher.poll("gym-main", 10).await.unwrap();
    assert!(claimed_again.is_empty());
}

#[tokio::test]
async fn poll_only_returns_commands_for_the_requested_kiosk() {
    let dispatcher = test_dispatcher().await;
    dispatcher.enqueue("gym-main", open_locker(1)).await.unwrap();
    dispatcher.enqueue("spa-area", open_locker(1)).await.unwrap();

    let claimed = dispatcher.poll("gym-main", 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].kiosk_id, "gym-main");
}

#[tokio::test]
async fn complete_success_marks_the_command_completed() {
    let dispatcher = test_dispatcher().await;
    let command = dispatcher.enqueue("gym-main", open_locker(5)).await.unwrap();
    dispatcher.poll("gym-main", 10).await.unwrap();

    let result = CommandResult { command_id: command.command_id, success: true, error: None };
    assert!(dispatcher.complete(&result).await.unwrap());

    // Completed commands are no longer polled.
    dispatcher.enqueue("gym-main", open_locker(6)).await.unwrap();
    let claimed = dispatcher.poll("gym-main", 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].payload, open_locker(6));
}

#[tokio::test]
async fn complete_failure_retries_with_backoff_until_max_retries_then_fails() {
    let dispatcher = test_dispatcher().await;
    let command = dispatcher.enqueue("gym-main", open_locker(5)).await.unwrap();

    for _ in 0..2 {
        dispatcher.poll("gym-main", 10).await.unwrap();
        let result = CommandResult {
            command_id: command.command_id,
            success: false,
            error: Some("modbus timeout".into()),
        };
        assert!(dispatcher.complete(&result).await.unwrap());
    }

    // Still under max_retries (3): rescheduled pending, not failed.
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    let claimed = dispatcher.poll("gym-main", 10).await.unwrap();
    assert_eq!(claimed.len(), 1);

    // Third failure hits max_retries and terminates as failed.
    let result = CommandResult {
        command_id: command.command_id,
        success: false,
        error: Some("modbus timeout".into()),
    };
    assert!(dispatcher.complete(&result).await.unwrap());

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    let claimed = dispatcher.poll("gym-main", 10).await.unwrap();
    assert!(claimed.is_empty());
}

#[tokio::test]
async fn complete_on_unknown_command_id_returns_false() {
    let dispatcher = test_dispatcher().await;
    let result = CommandResult { command_id: uuid::Uuid::new_v4(), success: true, error: None };
    assert!(!dispatcher.complete(&result).await.unwrap());
}

#[tokio::test]
async fn a_duplicate_success_report_after_completion_is_a_no_op() {
    let dispatcher = test_dispatcher().await;
    let command = dispatcher.enqueue("gym-main", open_locker(5)).await.unwrap();
    dispatcher.poll("gym-main", 10).await.unwrap();

    let result = CommandResult { command_id: command.command_id, success: true, error: None };
    assert!(dispatcher.complete(&result).await.unwrap());

    // At-least-once delivery: the kiosk re-POSTs the same result after a
    // dropped response. The already-completed row must not be re-stamped.
    assert!(!dispatcher.complete(&result).await.unwrap());
}

#[tokio::test]
async fn a_late_failure_report_after_an_already_completed_success_is_ignored() {
    let dispatcher = test_dispatcher().await;
    let command = dispatcher.enqueue("gym-main", open_locker(5)).await.unwrap();
    dispatcher.poll("gym-main", 10).await.unwrap();

    let success = CommandResult { command_id: command.command_id, success: true, error: None };
    assert!(dispatcher.complete(&success).await.unwrap());

    let late_failure =
        CommandResult { command_id: command.command_id, success: false, error: Some("timed out".into()) };
    assert!(!dispatcher.complete(&late_failure).await.unwrap());

    // Still completed, not flipped back to pending/failed.
    dispatcher.enqueue("gym-main", open_locker(6)).await.unwrap();
    let claimed = dispatcher.poll("gym-main", 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].payload, open_locker(6));
}

#[tokio::test]
async fn clear_stale_fails_old_pending_commands_and_leaves_fresh_ones() {
    let dispatcher = test_dispatcher().await;
    dispatcher.enqueue("gym-main", open_locker(1)).await.unwrap();

    // Everything enqueued "just now" counts as stale against a zero threshold.
    let cleared = dispatcher.clear_stale("gym-main", chrono::Duration::milliseconds(0)).await.unwrap();
    assert_eq!(cleared, 1);

    let claimed = dispatcher.poll("gym-main", 10).await.unwrap();
    assert!(claimed.is_empty());
}

#[tokio::test]
async fn clear_stale_is_scoped_to_the_requested_kiosk() {
    let dispatcher = test_dispatcher().await;
    dispatcher.enqueue("gym-main", open_locker(1)).await.unwrap();
    dispatcher.enqueue("spa-area", open_locker(1)).await.unwrap();

    let cleared = dispatcher.clear_stale("gym-main", chrono::Duration::milliseconds(0)).await.unwrap();
    assert_eq!(cleared, 1);

    let claimed = dispatcher.poll("spa-area", 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
}
