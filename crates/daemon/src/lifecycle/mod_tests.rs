// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn config_load_uses_env_overrides() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("DEVTOOL_STATE_DIR", dir.path().join("state"));
    std::env::set_var("DEVTOOL_SOCKET", dir.path().join("custom.sock"));

    let config = Config::load().unwrap();
    assert_eq!(config.socket_path, dir.path().join("custom.sock"));
    assert_eq!(config.pid_path, dir.path().join("custom.sock.pid"));
    assert_eq!(config.state_dir, dir.path().join("state"));
    assert_eq!(config.snapshot_path, dir.path().join("state/state.json"));
    assert_eq!(config.tracker_path, dir.path().join("state/pids.json"));
    assert_eq!(config.tasks_dir, dir.path().join("state/tasks"));

    std::env::remove_var("DEVTOOL_STATE_DIR");
    std::env::remove_var("DEVTOOL_SOCKET");
}

#[test]
fn socket_in_use_error_names_the_pid() {
    let e = LifecycleError::SocketInUse(4242);
    assert_eq!(e.to_string(), "Another daemon (pid 4242) owns the socket");
}
