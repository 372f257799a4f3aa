// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphan reaping: children of a SIGKILLed daemon do not leak.

use super::helpers::{wait_until, SpecDaemon};
use std::os::unix::process::CommandExt;
use std::time::Duration;

fn pid_alive(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{pid}")).exists()
}

#[tokio::test]
async fn next_daemon_kills_tracked_groups_of_a_dead_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let tracker_path = dir.path().join("state").join("pids.json");
    std::fs::create_dir_all(tracker_path.parent().unwrap()).unwrap();

    // Stand-in for a daemon that was SIGKILLed: a live child process
    // group recorded in a tracker file written by another daemon pid.
    let mut child = std::process::Command::new("sleep")
        .arg("100")
        .process_group(0)
        .spawn()
        .unwrap();
    let pid = child.id();
    assert!(pid_alive(pid));

    std::fs::write(
        &tracker_path,
        serde_json::json!({
            "daemon_pid": 1,
            "updated_at": "2026-01-01T00:00:00Z",
            "processes": [{
                "id": "myapp:dev",
                "pid": pid,
                "pgid": pid,
                "project_path": "/p",
                "created_at": "2026-01-01T00:00:00Z",
            }],
        })
        .to_string(),
    )
    .unwrap();

    // A fresh daemon over the same state dir reaps the orphan.
    let daemon = SpecDaemon::start_in(dir).await;

    // try_wait both detects the kill and reaps the zombie.
    wait_until(
        move || child.try_wait().ok().flatten().is_some(),
        Duration::from_secs(5),
    )
    .await;
    assert!(!pid_alive(pid));

    // The tracker now belongs to the new daemon and holds no entries.
    let tracker: serde_json::Value = serde_json::from_slice(
        &std::fs::read(&daemon.daemon.config.tracker_path).unwrap(),
    )
    .unwrap();
    assert_eq!(tracker["daemon_pid"], std::process::id());
    assert!(tracker["processes"].as_array().unwrap().is_empty());

    daemon.stop().await;
}

#[tokio::test]
async fn clean_shutdown_leaves_no_tracked_entries() {
    let daemon = SpecDaemon::start().await;
    let mut client = daemon.client().await;

    let run = client.verb(devtool_wire::Verb::Run, &["sleep", "30"]).await;
    assert!(matches!(run, devtool_wire::Response::Json(_)));

    let tracker_path = daemon.daemon.config.tracker_path.clone();
    daemon.stop().await;

    let tracker: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&tracker_path).unwrap()).unwrap();
    assert!(tracker["processes"].as_array().unwrap().is_empty());
}
