// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn process_summary_round_trips() {
    let summary = ProcessSummary {
        id: "myapp:dev".to_string(),
        state: ProcessState::Running,
        pid: Some(4242),
        command: "npm".to_string(),
        args: vec!["run".to_string(), "dev".to_string()],
        project_path: PathBuf::from("/home/u/myapp"),
        started_at: Utc::now(),
        exit_code: None,
        urls: vec!["http://localhost:5173/".to_string()],
        output: RingStats { total_written: 10, available: 10, dropped: 0 },
    };
    let json = serde_json::to_string(&summary).unwrap();
    let back: ProcessSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(back, summary);
}

#[test]
fn proxy_summary_omits_empty_optionals() {
    let summary = ProxySummary {
        id: "myapp-1a2b3c:dev:localhost-5173".to_string(),
        target_url: "http://localhost:5173/".to_string(),
        listen_addr: None,
        path: PathBuf::from("/home/u/myapp"),
        running: false,
        created_at: Utc::now(),
        restart_count: 0,
        last_error: None,
        log: RingStats { total_written: 0, available: 0, dropped: 0 },
        agents: 0,
    };
    let json = serde_json::to_value(&summary).unwrap();
    assert!(json.get("listen_addr").is_none());
    assert!(json.get("last_error").is_none());
}

#[test]
fn run_request_defaults() {
    let parsed: RunRequest = serde_json::from_str("{}").unwrap();
    assert!(parsed.id.is_none());
    assert!(parsed.path.is_none());
    assert!(parsed.env.is_empty());
}
