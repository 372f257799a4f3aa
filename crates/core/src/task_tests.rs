// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Duration;

fn task(deliver_in: Duration) -> ScheduledTask {
    let now = Utc::now();
    ScheduledTask::new(
        SessionCode::new("claude-1"),
        "check the build",
        now + deliver_in,
        now,
        PathBuf::from("/home/u/app"),
    )
}

#[test]
fn fresh_task_is_pending_with_generated_id() {
    let t = task(Duration::minutes(5));
    assert_eq!(t.status, TaskStatus::Pending);
    assert_eq!(t.attempts, 0);
    assert!(t.id.as_str().starts_with("task-"));
}

#[test]
fn due_only_when_pending_and_past_deliver_at() {
    let now = Utc::now();

    let mut t = task(Duration::seconds(-1));
    assert!(t.is_due(now));

    t.status = TaskStatus::Cancelled;
    assert!(!t.is_due(now), "cancelled tasks never deliver");

    let future = task(Duration::minutes(10));
    assert!(!future.is_due(now));
}

#[test]
fn terminal_states() {
    assert!(!TaskStatus::Pending.is_terminal());
    assert!(TaskStatus::Delivered.is_terminal());
    assert!(TaskStatus::Failed.is_terminal());
    assert!(TaskStatus::Cancelled.is_terminal());
}

#[test]
fn serde_round_trip() {
    let t = task(Duration::hours(1));
    let json = serde_json::to_string(&t).unwrap();
    let back: ScheduledTask = serde_json::from_str(&json).unwrap();
    assert_eq!(back, t);
}
