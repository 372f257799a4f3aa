// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-proxy wiring: detected dev-server URLs become proxies.

use super::helpers::{json, SpecDaemon};
use devtool_wire::{ProxyCmd, Request, Response, Verb};
use std::time::Duration;

#[tokio::test]
async fn detected_url_creates_the_configured_proxy() {
    let daemon = SpecDaemon::start().await;
    let project = daemon.project(
        "myapp",
        Some(serde_json::json!({
            "proxies": [{"name": "dev", "script": "dev"}],
        })),
    );

    let mut client = daemon.client().await;

    // Supervise a process whose first stdout line announces the URL.
    let run = Request::with_json(
        Verb::Run,
        vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo 'Local: http://localhost:5173/'; sleep 30".to_string(),
        ],
        serde_json::json!({"id": "myapp:dev", "path": project}),
    );
    let summary = json(client.send(run).await);
    assert_eq!(summary["state"], "running");

    // Within two seconds the proxy list contains the wired proxy.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    let proxies = loop {
        let proxies = json(client.verb(Verb::Proxy(ProxyCmd::List), &[]).await);
        if !proxies.as_array().unwrap().is_empty() {
            break proxies;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("no proxy appeared within 2s");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    let proxy = &proxies[0];
    assert_eq!(proxy["target_url"], "http://localhost:5173/");
    let id = proxy["id"].as_str().unwrap();
    assert_eq!(id.rsplit(':').next().unwrap(), "localhost-5173");
    assert_eq!(id.split(':').nth(1).unwrap(), "dev");

    daemon.stop().await;
}

#[tokio::test]
async fn stopping_the_script_stops_its_proxy() {
    let daemon = SpecDaemon::start().await;
    let project = daemon.project(
        "myapp",
        Some(serde_json::json!({
            "proxies": [{"name": "dev", "script": "dev"}],
        })),
    );

    let mut client = daemon.client().await;
    let run = Request::with_json(
        Verb::Run,
        vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo 'Local: http://localhost:5199/'; sleep 30".to_string(),
        ],
        serde_json::json!({"id": "myapp:dev", "path": project}),
    );
    client.send(run).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let proxies = json(client.verb(Verb::Proxy(ProxyCmd::List), &[]).await);
        if !proxies.as_array().unwrap().is_empty() {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "proxy never appeared");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(
        client
            .verb(Verb::Proc(devtool_wire::ProcCmd::Stop), &["myapp:dev", "force"])
            .await,
        Response::Ok
    );

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let proxies = json(client.verb(Verb::Proxy(ProxyCmd::List), &[]).await);
        if proxies.as_array().unwrap().is_empty() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "proxy survived its script: {proxies}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    daemon.stop().await;
}
