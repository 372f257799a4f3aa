// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `PING`, `INFO`, `DETECT`, and `RUN`.

use super::{ConnState, ListenCtx};
use devtool_core::{script_id, DaemonError};
use devtool_wire::{DaemonInfo, Request, Response, RunRequest};
use std::path::PathBuf;
use std::sync::Arc;

pub(super) fn handle_info(ctx: &Arc<ListenCtx>) -> Response {
    Response::json(&DaemonInfo {
        pid: std::process::id(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        socket_path: ctx.socket_path.clone(),
        uptime_secs: ctx.start_time.elapsed().as_secs(),
        processes: ctx.supervisor.count(),
        proxies: ctx.engine.manager().count(),
        sessions: ctx.sessions.count(),
        pending_tasks: ctx.scheduler.pending_count(),
    })
}

pub(super) async fn handle_detect(
    request: &Request,
    ctx: &Arc<ListenCtx>,
    conn: &mut ConnState,
) -> Response {
    let path = match effective_path(request.args.first().map(String::as_str), conn) {
        Ok(path) => path,
        Err(e) => return e.into(),
    };
    match ctx.detector.detect(&path).await {
        Ok(value) => Response::Json(value),
        Err(e) => e.into(),
    }
}

/// `RUN cmd [args…]` with an optional JSON payload for id/cwd/env.
pub(super) async fn handle_run(
    request: &Request,
    ctx: &Arc<ListenCtx>,
    conn: &mut ConnState,
) -> Response {
    let Some(command) = request.args.first().cloned() else {
        return DaemonError::invalid_arg("RUN requires a command").into();
    };
    let args = request.args[1..].to_vec();

    let options: RunRequest = match request.json() {
        Some(payload) => match serde_json::from_value(payload.clone()) {
            Ok(options) => options,
            Err(e) => return DaemonError::invalid_arg(format!("bad RUN payload: {e}")).into(),
        },
        None => RunRequest::default(),
    };

    let project_path = match options.path {
        Some(path) => path,
        None => match effective_path(None, conn) {
            Ok(path) => path,
            Err(e) => return e.into(),
        },
    };

    let id = match options.id {
        Some(id) => devtool_core::ScriptId::new(id),
        None => {
            let stem = command.rsplit('/').next().unwrap_or(&command);
            script_id(&project_path, stem)
        }
    };

    let config = crate::supervisor::StartConfig {
        id,
        project_path,
        command,
        args,
        env: options.env,
        line_matchers: vec![],
    };

    match ctx.supervisor.start_or_reuse(config).await {
        Ok(entry) => Response::json(&entry.summary()),
        Err(e) => e.into(),
    }
}

/// Resolve the directory a verb should act on: explicit argument, then
/// the connection's attachment, then the daemon's cwd.
pub(super) fn effective_path(
    arg: Option<&str>,
    conn: &ConnState,
) -> Result<PathBuf, DaemonError> {
    if let Some(arg) = arg {
        return Ok(PathBuf::from(arg));
    }
    if let Some(path) = &conn.attached_path {
        return Ok(path.clone());
    }
    std::env::current_dir()
        .map_err(|e| DaemonError::internal(format!("no working directory: {e}")))
}
