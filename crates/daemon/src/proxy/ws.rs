// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket plumbing: the injected-agent hub, exec correlation, and
//! the pass-through bridge for the target's own WebSockets (HMR).

use super::ProxyServer;
use axum::extract::ws::{Message as AxMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use devtool_core::LogEntry;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as TgMessage;
use tracing::{debug, warn};

/// Result of a daemon-initiated browser execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    pub exec_id: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Fan-out hub over every agent socket attached to one proxy.
///
/// Senders are unbounded so a broadcast never silently batches or drops
/// frames; a dead socket is detected by its send failing and detached.
#[derive(Default, Debug)]
pub struct AgentHub {
    conns: Mutex<HashMap<u64, mpsc::UnboundedSender<String>>>,
    next_id: AtomicU64,
    pending_execs: Mutex<HashMap<String, oneshot::Sender<ExecOutcome>>>,
}

impl AgentHub {
    pub fn attach(&self) -> (u64, mpsc::UnboundedReceiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.conns.lock().insert(id, tx);
        (id, rx)
    }

    pub fn detach(&self, id: u64) {
        self.conns.lock().remove(&id);
    }

    pub fn count(&self) -> usize {
        self.conns.lock().len()
    }

    /// Send a frame to every attached socket; returns the receiver count.
    pub fn broadcast(&self, frame: &serde_json::Value) -> usize {
        let text = frame.to_string();
        let mut conns = self.conns.lock();
        conns.retain(|_, tx| tx.send(text.clone()).is_ok());
        conns.len()
    }

    /// Register interest in an `execution` reply for `exec_id`.
    pub fn register_exec(&self, exec_id: &str) -> oneshot::Receiver<ExecOutcome> {
        let (tx, rx) = oneshot::channel();
        self.pending_execs.lock().insert(exec_id.to_string(), tx);
        rx
    }

    pub fn abandon_exec(&self, exec_id: &str) {
        self.pending_execs.lock().remove(exec_id);
    }

    /// Deliver an `execution` reply to its waiter, if still waiting.
    pub fn resolve_exec(&self, outcome: ExecOutcome) {
        if let Some(tx) = self.pending_execs.lock().remove(&outcome.exec_id) {
            let _ = tx.send(outcome);
        }
    }
}

/// Inbound agent frame: `{type, data, url}`.
#[derive(Debug, Deserialize)]
struct AgentFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    url: Option<String>,
}

/// Handler for `GET /__devtool_metrics`.
pub async fn metrics_ws_handler(
    State(server): State<Arc<ProxyServer>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| agent_socket_loop(server, socket))
}

async fn agent_socket_loop(server: Arc<ProxyServer>, socket: WebSocket) {
    let (conn_id, mut outbound) = server.hub.attach();
    debug!(proxy = %server.id, conn_id, "agent socket attached");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(text) => {
                        if sink.send(AxMessage::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(AxMessage::Text(text))) => handle_agent_frame(&server, &text),
                    Some(Ok(AxMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(proxy = %server.id, error = %e, "agent socket error");
                        break;
                    }
                }
            }
        }
    }

    server.hub.detach(conn_id);
    debug!(proxy = %server.id, conn_id, "agent socket detached");
}

/// Append an inbound agent frame to the traffic log. Public to the
/// proxy module so tests can feed frames without a socket.
pub(crate) fn handle_agent_frame(server: &ProxyServer, text: &str) {
    let frame: AgentFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(proxy = %server.id, error = %e, "unparseable agent frame");
            return;
        }
    };
    let at = Utc::now();
    let url = frame.url.clone().unwrap_or_default();
    let data = frame.data;

    let entry = match frame.kind.as_str() {
        "error" => {
            server.pages.record_error(&url, at);
            LogEntry::FrontendError {
                message: str_field(&data, "message"),
                source: str_field(&data, "source"),
                line: num_field(&data, "line") as u32,
                column: num_field(&data, "column") as u32,
                stack: opt_str_field(&data, "stack"),
                at,
            }
        }
        "performance" => {
            server.pages.record_hit(&url, at);
            LogEntry::Performance {
                url,
                dom_content_loaded_ms: float_field(&data, "dom_content_loaded_ms"),
                load_ms: float_field(&data, "load_ms"),
                first_paint_ms: float_field(&data, "first_paint_ms"),
                first_contentful_paint_ms: float_field(&data, "first_contentful_paint_ms"),
                resource_count: float_field(&data, "resource_count").map(|v| v as u32),
                at,
            }
        }
        "screenshot" => LogEntry::Screenshot {
            name: str_field(&data, "name"),
            data: str_field(&data, "data"),
            width: num_field(&data, "width") as u32,
            height: num_field(&data, "height") as u32,
            at,
        },
        "custom_log" => LogEntry::CustomLog {
            level: str_field(&data, "level"),
            message: str_field(&data, "message"),
            data: data.get("data").cloned(),
            at,
        },
        "execution" => {
            let outcome = ExecOutcome {
                exec_id: str_field(&data, "id"),
                result: opt_str_field(&data, "result"),
                error: opt_str_field(&data, "error"),
                duration_ms: num_field(&data, "duration_ms"),
            };
            server.hub.resolve_exec(outcome.clone());
            LogEntry::Execution {
                exec_id: outcome.exec_id,
                result: outcome.result,
                error: outcome.error,
                duration_ms: outcome.duration_ms,
                at,
            }
        }
        other => {
            debug!(proxy = %server.id, kind = other, "ignoring unknown agent frame type");
            return;
        }
    };
    server.log.push(entry);
}

fn str_field(data: &serde_json::Value, key: &str) -> String {
    data.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

fn opt_str_field(data: &serde_json::Value, key: &str) -> Option<String> {
    data.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn num_field(data: &serde_json::Value, key: &str) -> u64 {
    data.get(key).and_then(|v| v.as_u64()).unwrap_or_default()
}

fn float_field(data: &serde_json::Value, key: &str) -> Option<f64> {
    data.get(key).and_then(|v| v.as_f64())
}

/// Bridge a client WebSocket to the same path on the target server.
/// Keeps dev-server hot-reload working through the proxy.
pub(crate) async fn bridge_upstream(server: Arc<ProxyServer>, client: WebSocket, path: String) {
    let target = match ws_target_url(&server.target_url, &path) {
        Some(url) => url,
        None => return,
    };

    let upstream = match tokio_tungstenite::connect_async(target.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!(proxy = %server.id, target = %target, error = %e, "upstream ws connect failed");
            return;
        }
    };

    let (mut client_sink, mut client_stream) = client.split();
    let (mut upstream_sink, mut upstream_stream) = upstream.split();

    loop {
        tokio::select! {
            from_client = client_stream.next() => {
                match from_client {
                    Some(Ok(msg)) => {
                        let Some(converted) = to_tungstenite(msg) else { break };
                        if upstream_sink.send(converted).await.is_err() {
                            break;
                        }
                    }
                    _ => break,
                }
            }
            from_upstream = upstream_stream.next() => {
                match from_upstream {
                    Some(Ok(msg)) => {
                        let Some(converted) = to_axum(msg) else { break };
                        if client_sink.send(converted).await.is_err() {
                            break;
                        }
                    }
                    _ => break,
                }
            }
        }
    }
}

/// `ws://{host:port}{path}` for the proxy's target.
fn ws_target_url(target_url: &str, path: &str) -> Option<String> {
    let (host, port) = devtool_core::parse_host_port(target_url)?;
    Some(format!("ws://{host}:{port}{path}"))
}

fn to_tungstenite(msg: AxMessage) -> Option<TgMessage> {
    match msg {
        AxMessage::Text(text) => Some(TgMessage::Text(text.into())),
        AxMessage::Binary(bytes) => Some(TgMessage::Binary(bytes.into())),
        AxMessage::Ping(bytes) => Some(TgMessage::Ping(bytes.into())),
        AxMessage::Pong(bytes) => Some(TgMessage::Pong(bytes.into())),
        AxMessage::Close(_) => None,
    }
}

fn to_axum(msg: TgMessage) -> Option<AxMessage> {
    match msg {
        TgMessage::Text(text) => Some(AxMessage::Text(text.to_string())),
        TgMessage::Binary(bytes) => Some(AxMessage::Binary(bytes.to_vec())),
        TgMessage::Ping(bytes) => Some(AxMessage::Ping(bytes.to_vec())),
        TgMessage::Pong(bytes) => Some(AxMessage::Pong(bytes.to_vec())),
        TgMessage::Close(_) | TgMessage::Frame(_) => None,
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
