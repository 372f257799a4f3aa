// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The reverse-proxy request path: forward, log, inject.

use super::ws;
use super::{inject, ProxyServer};
use axum::body::Body;
use axum::extract::{FromRequestParts, State, WebSocketUpgrade};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use devtool_core::LogEntry;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Request bodies are buffered for forwarding; dev-tool traffic is
/// small, so a generous cap beats streaming complexity.
const MAX_REQUEST_BODY: usize = 32 * 1024 * 1024;

/// Headers that must not be forwarded in either direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Fallback handler: WebSocket upgrades are bridged to the target,
/// everything else is forwarded over HTTP.
pub async fn forward_handler(
    State(server): State<Arc<ProxyServer>>,
    req: Request<Body>,
) -> Response {
    if is_websocket_upgrade(req.headers()) {
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let (mut parts, _body) = req.into_parts();
        return match WebSocketUpgrade::from_request_parts(&mut parts, &server).await {
            Ok(upgrade) => upgrade
                .on_upgrade(move |socket| ws::bridge_upstream(server, socket, path)),
            Err(rejection) => {
                debug!(proxy = %server.id, "bad websocket upgrade request");
                rejection.into_response()
            }
        };
    }

    forward_http(server, req).await
}

async fn forward_http(server: Arc<ProxyServer>, req: Request<Body>) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let requested_url = join_target(&server.target_url, &path_and_query);

    let (parts, body) = req.into_parts();
    let request_bytes = match axum::body::to_bytes(body, MAX_REQUEST_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response()
        }
    };
    let request_len = request_bytes.len() as u64;

    let reqwest_method = match reqwest::Method::from_bytes(method.as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => return (StatusCode::METHOD_NOT_ALLOWED, "bad method").into_response(),
    };

    let mut upstream = server.http_client().request(reqwest_method, &requested_url);
    for (name, value) in parts.headers.iter() {
        let lowered = name.as_str().to_ascii_lowercase();
        // Upstream must answer uncompressed or injection cannot read
        // the body, so the accept-encoding header stays behind too.
        if HOP_BY_HOP.contains(&lowered.as_str())
            || lowered == "host"
            || lowered == "content-length"
            || lowered == "accept-encoding"
        {
            continue;
        }
        if let Ok(value) = value.to_str() {
            upstream = upstream.header(name.as_str(), value);
        }
    }
    if !request_bytes.is_empty() {
        upstream = upstream.body(request_bytes);
    }

    let response = match upstream.send().await {
        Ok(response) => response,
        Err(e) => {
            let message = format!("upstream request failed: {e}");
            warn!(proxy = %server.id, url = %requested_url, error = %e, "upstream failure");
            server.log.push(LogEntry::Http {
                method: method.to_string(),
                url: requested_url,
                status: 502,
                request_bytes: request_len,
                response_bytes: 0,
                duration_ms: started.elapsed().as_millis() as u64,
                at: Utc::now(),
                error: Some(message.clone()),
            });
            return (StatusCode::BAD_GATEWAY, message).into_response();
        }
    };

    let status = response.status();
    let headers = response.headers().clone();
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let log_entry = |response_bytes: u64| LogEntry::Http {
        method: method.to_string(),
        url: requested_url.clone(),
        status: status.as_u16(),
        request_bytes: request_len,
        response_bytes,
        duration_ms: started.elapsed().as_millis() as u64,
        at: Utc::now(),
        error: None,
    };

    if inject::is_html_content_type(&content_type) {
        // Buffer, inject, recompute Content-Length.
        let body = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                let message = format!("upstream body read failed: {e}");
                server.log.push(LogEntry::Http {
                    method: method.to_string(),
                    url: requested_url.clone(),
                    status: 502,
                    request_bytes: request_len,
                    response_bytes: 0,
                    duration_ms: started.elapsed().as_millis() as u64,
                    at: Utc::now(),
                    error: Some(message.clone()),
                });
                return (StatusCode::BAD_GATEWAY, message).into_response();
            }
        };

        let html = String::from_utf8_lossy(&body);
        let rewritten = inject::inject_into_html(&html);
        let rewritten_len = rewritten.len() as u64;

        server.pages.record_hit(&requested_url, Utc::now());
        server.log.push(log_entry(rewritten_len));

        let mut builder = Response::builder().status(status);
        for (name, value) in headers.iter() {
            let lowered = name.as_str().to_ascii_lowercase();
            if HOP_BY_HOP.contains(&lowered.as_str())
                || lowered == "content-length"
                || lowered == "content-encoding"
            {
                continue;
            }
            builder = builder.header(name, value);
        }
        builder = builder.header(
            "content-length",
            HeaderValue::from_str(&rewritten_len.to_string())
                .unwrap_or(HeaderValue::from_static("0")),
        );
        return builder
            .body(Body::from(rewritten))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    }

    // Non-HTML: stream the body straight through.
    let response_len = headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    server.log.push(log_entry(response_len));

    let mut builder = Response::builder().status(status);
    for (name, value) in headers.iter() {
        let lowered = name.as_str().to_ascii_lowercase();
        if HOP_BY_HOP.contains(&lowered.as_str()) {
            continue;
        }
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from_stream(response.bytes_stream()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Join the proxy target base with the request's path and query.
fn join_target(target_url: &str, path_and_query: &str) -> String {
    let base = target_url.trim_end_matches('/');
    format!("{base}{path_and_query}")
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
