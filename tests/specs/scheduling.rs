// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler delivery through a real overlay socket.

use super::helpers::{json, spawn_overlay, wait_until, SpecDaemon};
use devtool_wire::{Request, Response, SessionCmd, Verb};
use std::time::Duration;

#[tokio::test]
async fn scheduled_message_is_typed_into_the_session() {
    let daemon = SpecDaemon::start().await;
    let overlay_socket = daemon.dir.path().join("overlay.sock");
    let bodies = spawn_overlay(overlay_socket.clone());

    let mut client = daemon.client().await;
    let register = Request::with_json(
        Verb::Session(SessionCmd::Register),
        vec![],
        serde_json::json!({
            "code": "s",
            "overlay_socket": overlay_socket,
            "project_path": "/p",
            "command": "claude",
        }),
    );
    assert!(matches!(client.send(register).await, Response::Json(_)));

    let scheduled = json(
        client
            .verb(Verb::Session(SessionCmd::Schedule), &["s", "100ms", "hi"])
            .await,
    );
    let task_id = scheduled["task_id"].as_str().unwrap().to_string();

    // Within 2s the daemon POSTs /type with the documented body.
    {
        let bodies = std::sync::Arc::clone(&bodies);
        wait_until(move || !bodies.lock().unwrap().is_empty(), Duration::from_secs(2)).await;
    }
    let delivered = bodies.lock().unwrap()[0].clone();
    assert_eq!(
        delivered,
        serde_json::json!({"text": "hi", "enter": true, "instant": true})
    );

    // The delivered task left TASKS.
    let tasks = json(client.verb(Verb::Session(SessionCmd::Tasks), &["/p"]).await);
    assert!(
        tasks.as_array().unwrap().iter().all(|t| t["id"] != task_id.as_str()),
        "delivered task still listed: {tasks}"
    );

    daemon.stop().await;
}

#[tokio::test]
async fn cancelled_task_never_reaches_the_overlay() {
    let daemon = SpecDaemon::start().await;
    let overlay_socket = daemon.dir.path().join("overlay.sock");
    let bodies = spawn_overlay(overlay_socket.clone());

    let mut client = daemon.client().await;
    let register = Request::with_json(
        Verb::Session(SessionCmd::Register),
        vec![],
        serde_json::json!({
            "code": "s",
            "overlay_socket": overlay_socket,
            "project_path": "/p",
            "command": "claude",
        }),
    );
    client.send(register).await;

    let scheduled = json(
        client
            .verb(Verb::Session(SessionCmd::Schedule), &["s", "1h", "too late"])
            .await,
    );
    let task_id = scheduled["task_id"].as_str().unwrap().to_string();

    assert_eq!(
        client.verb(Verb::Session(SessionCmd::Cancel), &[&task_id]).await,
        Response::Ok
    );
    let tasks = json(client.verb(Verb::Session(SessionCmd::Tasks), &["/p"]).await);
    assert!(tasks.as_array().unwrap().is_empty());

    // Give the ticker a moment; nothing must arrive.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(bodies.lock().unwrap().is_empty());

    daemon.stop().await;
}
