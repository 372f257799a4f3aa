// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket-level protocol specs: round trips the documentation promises.

use super::helpers::{json, SpecDaemon};
use devtool_core::ErrorKind;
use devtool_wire::{OverlayCmd, Request, Response, SessionCmd, StoreCmd, Verb};

fn register_payload(dir: &std::path::Path, code: &str, project: &str) -> Request {
    Request::with_json(
        Verb::Session(SessionCmd::Register),
        vec![],
        serde_json::json!({
            "code": code,
            "overlay_socket": dir.join(format!("{code}.sock")),
            "project_path": project,
            "command": "claude",
        }),
    )
}

#[tokio::test]
async fn ping_and_info() {
    let daemon = SpecDaemon::start().await;
    let mut client = daemon.client().await;

    assert_eq!(client.verb(Verb::Ping, &[]).await, Response::Ok);

    let info = json(client.verb(Verb::Info, &[]).await);
    assert_eq!(info["pid"], std::process::id());
    assert_eq!(info["sessions"], 0);

    daemon.stop().await;
}

#[tokio::test]
async fn session_register_get_unregister_round_trip() {
    let daemon = SpecDaemon::start().await;
    let mut client = daemon.client().await;

    let record = json(
        client.send(register_payload(daemon.dir.path(), "claude-1", "/p")).await,
    );
    assert_eq!(record["code"], "claude-1");

    let got = json(client.verb(Verb::Session(SessionCmd::Get), &["claude-1"]).await);
    assert_eq!(got["code"], "claude-1");
    assert_eq!(got["status"], "active");

    assert_eq!(
        client.verb(Verb::Session(SessionCmd::Unregister), &["claude-1"]).await,
        Response::Ok
    );
    let gone = client.verb(Verb::Session(SessionCmd::Get), &["claude-1"]).await;
    assert!(matches!(gone, Response::Err { kind: ErrorKind::NotFound, .. }));

    daemon.stop().await;
}

#[tokio::test]
async fn overlay_round_trip() {
    let daemon = SpecDaemon::start().await;
    let mut client = daemon.client().await;

    assert_eq!(
        client.verb(Verb::Overlay(OverlayCmd::Set), &["/tmp/ep.sock"]).await,
        Response::Ok
    );
    assert_eq!(
        json(client.verb(Verb::Overlay(OverlayCmd::Get), &[]).await),
        serde_json::json!("/tmp/ep.sock")
    );
    assert_eq!(client.verb(Verb::Overlay(OverlayCmd::Clear), &[]).await, Response::Ok);
    assert_eq!(
        json(client.verb(Verb::Overlay(OverlayCmd::Get), &[]).await),
        serde_json::json!("")
    );

    daemon.stop().await;
}

#[tokio::test]
async fn store_round_trip_with_payload() {
    let daemon = SpecDaemon::start().await;
    let mut client = daemon.client().await;

    let set = Request::with_json(
        Verb::Store(StoreCmd::Set),
        vec!["build".to_string()],
        serde_json::json!({"status": "green", "commit": "abc123"}),
    );
    assert_eq!(client.send(set).await, Response::Ok);

    let value = json(client.verb(Verb::Store(StoreCmd::Get), &["build"]).await);
    assert_eq!(value["status"], "green");

    let all = json(client.verb(Verb::Store(StoreCmd::GetAll), &[]).await);
    assert_eq!(all.as_array().unwrap().len(), 1);

    assert_eq!(client.verb(Verb::Store(StoreCmd::Clear), &[]).await, Response::Ok);
    assert_eq!(
        json(client.verb(Verb::Store(StoreCmd::List), &[]).await),
        serde_json::json!([])
    );

    daemon.stop().await;
}

#[tokio::test]
async fn quoted_arguments_survive_the_wire() {
    let daemon = SpecDaemon::start().await;
    let mut client = daemon.client().await;

    client
        .send(register_payload(daemon.dir.path(), "claude-1", "/p"))
        .await;

    // A message with spaces and quotes rides the request line.
    let scheduled = json(
        client
            .verb(
                Verb::Session(SessionCmd::Schedule),
                &["claude-1", "1h", r#"say "hello" to the build"#],
            )
            .await,
    );
    assert!(scheduled["task_id"].as_str().unwrap().starts_with("task-"));

    let tasks = json(client.verb(Verb::Session(SessionCmd::Tasks), &["/p"]).await);
    assert_eq!(tasks[0]["message"], r#"say "hello" to the build"#);

    daemon.stop().await;
}

#[tokio::test]
async fn errors_carry_documented_kinds() {
    let daemon = SpecDaemon::start().await;
    let mut client = daemon.client().await;

    let not_found = client.verb(Verb::Session(SessionCmd::Get), &["ghost-9"]).await;
    assert!(matches!(not_found, Response::Err { kind: ErrorKind::NotFound, .. }));

    let unavailable = client.verb(Verb::Tunnel(devtool_wire::TunnelCmd::List), &[]).await;
    assert!(matches!(unavailable, Response::Err { kind: ErrorKind::Unavailable, .. }));

    let invalid = client.verb(Verb::Session(SessionCmd::Schedule), &["x"]).await;
    assert!(matches!(invalid, Response::Err { kind: ErrorKind::InvalidArg, .. }));

    daemon.stop().await;
}
