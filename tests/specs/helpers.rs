// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spec fixtures: an in-process daemon on a temp socket, a line-protocol
//! client, and small HTTP helpers built on raw TCP.

use devtool_daemon::lifecycle::{startup, Config, DaemonState};
use devtool_wire::{read_response, write_request, Request, Response, Verb};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A daemon running on a temp socket with its accept loop spawned.
pub struct SpecDaemon {
    pub daemon: DaemonState,
    pub dir: tempfile::TempDir,
}

impl SpecDaemon {
    pub async fn start() -> Self {
        Self::start_in(tempfile::tempdir().unwrap()).await
    }

    /// Start over an existing directory (pre-seeded state files).
    pub async fn start_in(dir: tempfile::TempDir) -> Self {
        let state_dir = dir.path().join("state");
        let config = Config {
            socket_path: dir.path().join("devtool-mcp.sock"),
            pid_path: dir.path().join("devtool-mcp.sock.pid"),
            log_path: state_dir.join("daemon.log"),
            snapshot_path: state_dir.join("state.json"),
            tracker_path: state_dir.join("pids.json"),
            tasks_dir: state_dir.join("tasks"),
            store_path: state_dir.join("store.json"),
            state_dir,
        };

        let result = startup(&config).await.unwrap();
        tokio::spawn(result.listener.run(result.daemon.token.clone()));
        Self { daemon: result.daemon, dir }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.daemon.config.socket_path.clone()
    }

    /// Create a project directory with a pre-parsed devtool config.
    pub fn project(&self, name: &str, config: Option<serde_json::Value>) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path).unwrap();
        if let Some(config) = config {
            let config_dir = path.join(".devtool");
            std::fs::create_dir_all(&config_dir).unwrap();
            std::fs::write(config_dir.join("config.json"), config.to_string()).unwrap();
        }
        path
    }

    pub async fn client(&self) -> Client {
        Client::connect(&self.socket_path()).await
    }

    pub async fn stop(self) {
        self.daemon.shutdown().await;
    }
}

/// One protocol connection.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(socket: &Path) -> Self {
        let stream = UnixStream::connect(socket).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self { reader: BufReader::new(reader), writer }
    }

    pub async fn send(&mut self, request: Request) -> Response {
        write_request(&mut self.writer, &request, TIMEOUT).await.unwrap();
        read_response(&mut self.reader, TIMEOUT).await.unwrap()
    }

    pub async fn verb(&mut self, verb: Verb, args: &[&str]) -> Response {
        self.send(Request::with_args(verb, args.iter().map(|s| s.to_string()).collect()))
            .await
    }
}

/// Expect a JSON response and return the value.
pub fn json(response: Response) -> serde_json::Value {
    match response {
        Response::Json(value) => value,
        other => panic!("expected JSON response, got {other:?}"),
    }
}

/// Minimal HTTP upstream: every request gets the same HTML page.
pub async fn spawn_html_upstream() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { break };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let body = "<html><head></head><body>ok</body></html>";
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
            });
        }
    });
    port
}

/// One raw `GET /` against an address; returns the status line.
pub async fn raw_get(addr: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).lines().next().unwrap_or_default().to_string()
}

/// Overlay peer: a Unix-socket HTTP server recording POSTed bodies.
pub fn spawn_overlay(
    socket: PathBuf,
) -> std::sync::Arc<std::sync::Mutex<Vec<serde_json::Value>>> {
    let bodies = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let listener = UnixListener::bind(&socket).unwrap();
    let task_bodies = std::sync::Arc::clone(&bodies);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { break };
            let bodies = std::sync::Arc::clone(&task_bodies);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);
                if let Some(body) = request.split("\r\n\r\n").nth(1) {
                    if let Ok(value) = serde_json::from_str(body) {
                        bodies.lock().unwrap().push(value);
                    }
                }
                let _ = stream
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
                    .await;
            });
        }
    });
    bodies
}

/// Poll until `check` passes or the deadline lapses.
pub async fn wait_until<F: FnMut() -> bool>(mut check: F, deadline: Duration) {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("condition not reached within {deadline:?}");
}
