// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Overlay plumbing: the daemon-global overlay endpoint and the
//! HTTP/1.1-over-Unix-socket client used to reach session overlays.
//!
//! Sends HTTP/1.1 requests over Unix domain sockets. Reads responses
//! using Content-Length framing (does not depend on connection close
//! for EOF). The peer only sees a dummy `Host: localhost` header.

use devtool_core::DaemonError;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Daemon-global overlay endpoint. Reads are lock-free in practice -
/// a `parking_lot` read lock on an uncontended word.
#[derive(Default)]
pub struct OverlayEndpoint {
    endpoint: RwLock<Option<PathBuf>>,
}

impl OverlayEndpoint {
    pub fn new(initial: Option<PathBuf>) -> Self {
        Self { endpoint: RwLock::new(initial) }
    }

    pub fn get(&self) -> Option<PathBuf> {
        self.endpoint.read().clone()
    }

    pub fn set(&self, path: PathBuf) {
        *self.endpoint.write() = Some(path);
    }

    pub fn clear(&self) {
        *self.endpoint.write() = None;
    }
}

/// POST a JSON body to `path` on the overlay socket.
pub async fn post(
    socket_path: &Path,
    path: &str,
    body: &serde_json::Value,
) -> Result<String, DaemonError> {
    let body = body.to_string();
    let request = format!(
        "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        path,
        body.len(),
        body
    );
    timed_request(socket_path, &request).await
}

/// GET `path` on the overlay socket.
pub async fn get(socket_path: &Path, path: &str) -> Result<String, DaemonError> {
    let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
    timed_request(socket_path, &request).await
}

/// Connect, send, and read with a 5-second timeout covering the entire
/// operation (connect + write + read). Prevents hangs when the overlay
/// accepts the connection but never responds.
async fn timed_request(socket_path: &Path, request: &str) -> Result<String, DaemonError> {
    tokio::time::timeout(Duration::from_secs(5), send_request(socket_path, request))
        .await
        .map_err(|_| DaemonError::timeout("overlay request timed out"))?
}

async fn send_request(socket_path: &Path, request: &str) -> Result<String, DaemonError> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| DaemonError::unavailable(format!("overlay connect failed: {e}")))?;
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| DaemonError::internal(format!("overlay write failed: {e}")))?;

    let mut reader = BufReader::new(&mut stream);
    read_http_response(&mut reader).await
}

/// Read and parse an HTTP/1.1 response from a buffered stream.
async fn read_http_response<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<String, DaemonError> {
    // Status line
    let mut status_line = String::new();
    reader
        .read_line(&mut status_line)
        .await
        .map_err(|e| DaemonError::internal(format!("overlay read status failed: {e}")))?;

    let status_code =
        status_line.split_whitespace().nth(1).and_then(|s| s.parse::<u16>().ok()).unwrap_or(0);

    // Headers; extract Content-Length (case-insensitive)
    let mut content_length: usize = 0;
    loop {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .await
            .map_err(|e| DaemonError::internal(format!("overlay read header failed: {e}")))?;
        if line == "\r\n" || line.is_empty() {
            break;
        }
        let line_lower = line.to_ascii_lowercase();
        if let Some(val) = line_lower.strip_prefix("content-length:") {
            content_length = val.trim().parse().unwrap_or(0);
        }
    }

    // Body
    let body = if content_length > 0 {
        let mut buf = vec![0u8; content_length];
        reader
            .read_exact(&mut buf)
            .await
            .map_err(|e| DaemonError::internal(format!("overlay read body failed: {e}")))?;
        String::from_utf8_lossy(&buf).into_owned()
    } else {
        String::new()
    };

    if status_code != 200 {
        return Err(DaemonError::unavailable(format!(
            "overlay HTTP {}: {}",
            status_code,
            body.trim()
        )));
    }

    Ok(body)
}

#[cfg(test)]
#[path = "overlay_tests.rs"]
mod tests;
