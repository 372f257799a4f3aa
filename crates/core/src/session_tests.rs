// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn next_code_starts_at_one() {
    let code = next_code("claude", [].into_iter());
    assert_eq!(code, "claude-1");
}

#[test]
fn next_code_increments_past_max() {
    let existing = ["claude-1", "claude-3", "claude-2"];
    let code = next_code("claude", existing.into_iter());
    assert_eq!(code, "claude-4");
}

#[test]
fn next_code_ignores_other_prefixes_and_garbage() {
    let existing = ["cursor-9", "claude-2", "claude-x", "claudette-5"];
    let code = next_code("claude", existing.into_iter());
    assert_eq!(code, "claude-3");
}

#[test]
fn session_record_serde_round_trip() {
    let record = SessionRecord {
        code: SessionCode::new("claude-1"),
        overlay_socket: PathBuf::from("/tmp/overlay.sock"),
        project_path: PathBuf::from("/home/u/app"),
        command: "claude".to_string(),
        args: vec!["--resume".to_string()],
        started_at: Utc::now(),
        status: SessionStatus::Active,
        last_seen: Utc::now(),
    };
    let json = serde_json::to_string(&record).unwrap();
    let back: SessionRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
}
