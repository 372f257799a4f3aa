// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-scoped cleanup when the owning connection disappears.

use super::helpers::{json, wait_until, SpecDaemon};
use devtool_wire::{ProxyCmd, Request, Response, SessionCmd, Verb};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn closing_the_registering_connection_cleans_its_project() {
    let daemon = SpecDaemon::start().await;
    let p1 = daemon.project("p1", None);
    let p2 = daemon.project("p2", None);

    // C1 registers session s1 for p1 and starts a process and a proxy.
    let mut c1 = daemon.client().await;
    let register = Request::with_json(
        Verb::Session(SessionCmd::Register),
        vec![],
        serde_json::json!({
            "code": "s1",
            "overlay_socket": daemon.dir.path().join("s1.sock"),
            "project_path": p1,
            "command": "claude",
        }),
    );
    assert!(matches!(c1.send(register).await, Response::Json(_)));

    let run = c1.verb(Verb::Run, &["sleep", "30"]).await;
    assert!(matches!(run, Response::Json(_)));
    let px = c1
        .verb(Verb::Proxy(ProxyCmd::Start), &["px", "http://localhost:5173/"])
        .await;
    assert!(matches!(px, Response::Json(_)));

    // C2 has no session and starts a proxy in p2.
    let mut c2 = daemon.client().await;
    c2.verb(Verb::Session(SessionCmd::Attach), &[p2.to_str().unwrap()]).await;
    let py = c2
        .verb(Verb::Proxy(ProxyCmd::Start), &["py", "http://localhost:5174/"])
        .await;
    assert!(matches!(py, Response::Json(_)));

    // C1's socket closes.
    drop(c1);

    // Within a second: px stopped, py alive, s1 unregistered.
    let ctx = Arc::clone(&daemon.daemon.ctx);
    {
        let ctx = Arc::clone(&ctx);
        wait_until(
            move || ctx.engine.manager().count() == 1 && ctx.sessions.count() == 0,
            Duration::from_secs(1),
        )
        .await;
    }

    let proxies = json(c2.verb(Verb::Proxy(ProxyCmd::List), &[]).await);
    let ids: Vec<&str> =
        proxies.as_array().unwrap().iter().map(|p| p["id"].as_str().unwrap()).collect();
    assert_eq!(ids.len(), 1);
    assert!(ids[0].contains(":py:"), "only p2's proxy survives: {ids:?}");

    let sessions = json(c2.verb(Verb::Session(SessionCmd::List), &[]).await);
    assert!(sessions.as_array().unwrap().is_empty());

    // The supervised process was stopped too.
    assert!(ctx
        .supervisor
        .list(Some(&p1))
        .iter()
        .all(|p| p.state.is_terminal()));

    daemon.stop().await;
}

#[tokio::test]
async fn attach_only_connections_trigger_no_cleanup() {
    let daemon = SpecDaemon::start().await;
    let p1 = daemon.project("p1", None);

    let mut c1 = daemon.client().await;
    c1.verb(Verb::Session(SessionCmd::Attach), &[p1.to_str().unwrap()]).await;
    let started = c1
        .verb(Verb::Proxy(ProxyCmd::Start), &["dev", "http://localhost:5173/"])
        .await;
    assert!(matches!(started, Response::Json(_)));

    drop(c1);
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Manually created resources outlive the attach-only connection.
    let mut c2 = daemon.client().await;
    let proxies = json(c2.verb(Verb::Proxy(ProxyCmd::List), &[]).await);
    assert_eq!(proxies.as_array().unwrap().len(), 1);

    daemon.stop().await;
}
