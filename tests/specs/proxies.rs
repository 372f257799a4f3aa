// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy behavior through the wire: explicit start, fuzzy scoping,
//! traffic-log eviction.

use super::helpers::{json, raw_get, spawn_html_upstream, SpecDaemon};
use devtool_core::ErrorKind;
use devtool_wire::{
    PageCmd, ProxyCmd, ProxyLogCmd, Request, Response, SessionCmd, Verb,
};

#[tokio::test]
async fn proxy_start_is_not_idempotent() {
    let daemon = SpecDaemon::start().await;
    let mut client = daemon.client().await;
    daemon.project("myapp", None);

    client
        .verb(Verb::Session(SessionCmd::Attach), &[daemon
            .dir
            .path()
            .join("myapp")
            .to_str()
            .unwrap()])
        .await;

    let started = client
        .verb(Verb::Proxy(ProxyCmd::Start), &["dev", "http://localhost:5173/"])
        .await;
    assert!(matches!(started, Response::Json(_)));

    let again = client
        .verb(Verb::Proxy(ProxyCmd::Start), &["dev", "http://localhost:5173/"])
        .await;
    assert!(matches!(again, Response::Err { kind: ErrorKind::Exists, .. }));

    daemon.stop().await;
}

#[tokio::test]
async fn fuzzy_lookup_scopes_to_the_attached_session() {
    let daemon = SpecDaemon::start().await;
    let path_a = daemon.project("a", None);
    let path_b = daemon.project("b", None);

    // One `dev` proxy per project, created by two attached clients.
    for path in [&path_a, &path_b] {
        let mut client = daemon.client().await;
        client
            .verb(Verb::Session(SessionCmd::Attach), &[path.to_str().unwrap()])
            .await;
        let port = if path == &path_a { 3000 } else { 4000 };
        let response = client
            .verb(
                Verb::Proxy(ProxyCmd::Start),
                &["dev", &format!("http://localhost:{port}/")],
            )
            .await;
        assert!(matches!(response, Response::Json(_)));
    }

    // Attached client: `dev` resolves inside its project.
    let mut attached = daemon.client().await;
    attached
        .verb(Verb::Session(SessionCmd::Attach), &[path_a.to_str().unwrap()])
        .await;
    let pages = attached.verb(Verb::CurrentPage(PageCmd::List), &["dev"]).await;
    assert_eq!(pages, Response::Json(serde_json::json!([])));

    let status = json(attached.verb(Verb::Proxy(ProxyCmd::Status), &["dev"]).await);
    assert_eq!(status["target_url"], "http://localhost:3000/");

    // Fresh client without attachment: ambiguous.
    let mut fresh = daemon.client().await;
    let ambiguous = fresh.verb(Verb::CurrentPage(PageCmd::List), &["dev"]).await;
    assert!(matches!(ambiguous, Response::Err { kind: ErrorKind::Ambiguous, .. }));

    daemon.stop().await;
}

#[tokio::test]
async fn traffic_log_eviction_shows_in_stats() {
    let daemon = SpecDaemon::start().await;
    let project = daemon.project("myapp", None);
    let upstream_port = spawn_html_upstream().await;

    let mut client = daemon.client().await;
    client
        .verb(Verb::Session(SessionCmd::Attach), &[project.to_str().unwrap()])
        .await;

    let start = Request::with_json(
        Verb::Proxy(ProxyCmd::Start),
        vec!["dev".to_string()],
        serde_json::json!({
            "name": "dev",
            "url": format!("http://127.0.0.1:{upstream_port}/"),
            "max_log_size": 5,
        }),
    );
    let summary = json(client.send(start).await);
    let listen_addr = summary["listen_addr"].as_str().unwrap().to_string();

    for _ in 0..8 {
        let status_line = raw_get(&listen_addr).await;
        assert!(status_line.contains("200"), "proxied GET failed: {status_line}");
    }

    let stats = json(client.verb(Verb::ProxyLog(ProxyLogCmd::Stats), &["dev"]).await);
    assert_eq!(stats["total_entries"], 8);
    assert_eq!(stats["available_entries"], 5);
    assert_eq!(stats["dropped"], 3);

    // Injection happened on every HTML response.
    let entries = json(client.verb(Verb::ProxyLog(ProxyLogCmd::Query), &["dev"]).await);
    assert_eq!(entries.as_array().unwrap().len(), 5);

    assert_eq!(
        client.verb(Verb::ProxyLog(ProxyLogCmd::Clear), &["dev"]).await,
        Response::Ok
    );
    let stats = json(client.verb(Verb::ProxyLog(ProxyLogCmd::Stats), &["dev"]).await);
    assert_eq!(stats["total_entries"], 0);

    daemon.stop().await;
}

#[tokio::test]
async fn injected_html_flows_through_the_proxy() {
    let daemon = SpecDaemon::start().await;
    let project = daemon.project("myapp", None);
    let upstream_port = spawn_html_upstream().await;

    let mut client = daemon.client().await;
    client
        .verb(Verb::Session(SessionCmd::Attach), &[project.to_str().unwrap()])
        .await;
    let summary = json(
        client
            .verb(
                Verb::Proxy(ProxyCmd::Start),
                &["dev", &format!("http://127.0.0.1:{upstream_port}/")],
            )
            .await,
    );
    let listen_addr = summary["listen_addr"].as_str().unwrap().to_string();

    let mut stream = tokio::net::TcpStream::connect(&listen_addr).await.unwrap();
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);

    assert_eq!(response.matches("__devtool_metrics").count(), 1);
    assert!(response.contains("<body>ok</body>"));

    daemon.stop().await;
}
