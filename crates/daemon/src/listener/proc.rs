// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `PROC` sub-verb handlers.

use super::{ConnState, ListenCtx};
use crate::supervisor::OutputQuery;
use devtool_core::{DaemonError, ScriptId, StreamKind};
use devtool_wire::{ProcCmd, Request, Response};
use std::path::Path;
use std::sync::Arc;

pub(super) async fn handle(
    cmd: ProcCmd,
    request: &Request,
    ctx: &Arc<ListenCtx>,
    conn: &mut ConnState,
) -> Response {
    match cmd {
        ProcCmd::Status => match request.arg(0) {
            Ok(id) => ctx.supervisor.status(&ScriptId::new(id)).into(),
            Err(e) => bad(e),
        },

        ProcCmd::Output => {
            let id = match request.arg(0) {
                Ok(id) => ScriptId::new(id),
                Err(e) => return bad(e),
            };
            let query = match parse_output_query(request) {
                Ok(query) => query,
                Err(e) => return e.into(),
            };
            ctx.supervisor.output(&id, &query).into()
        }

        ProcCmd::Stop => {
            let id = match request.arg(0) {
                Ok(id) => ScriptId::new(id),
                Err(e) => return bad(e),
            };
            let force = request.args.iter().any(|a| a == "force" || a == "--force");
            match ctx.supervisor.stop(&id, force).await {
                Ok(()) => Response::Ok,
                Err(e) => e.into(),
            }
        }

        ProcCmd::Restart => {
            let id = match request.arg(0) {
                Ok(id) => ScriptId::new(id),
                Err(e) => return bad(e),
            };
            match ctx.supervisor.restart(&id).await {
                Ok(entry) => Response::json(&entry.summary()),
                Err(e) => e.into(),
            }
        }

        ProcCmd::List => {
            let directory = match request.args.first().map(String::as_str) {
                Some("global") | Some("--global") => None,
                Some(dir) => Some(Path::new(dir).to_path_buf()),
                None => conn.attached_path.clone(),
            };
            Response::json(&ctx.supervisor.list(directory.as_deref()))
        }

        ProcCmd::CleanupPort => {
            let port: u16 = match request.arg(0).ok().and_then(|p| p.parse().ok()) {
                Some(port) => port,
                None => {
                    return DaemonError::invalid_arg("CLEANUP-PORT requires a port").into()
                }
            };
            let stopped = ctx.supervisor.cleanup_port(port).await;
            Response::json(&serde_json::json!({ "stopped": stopped }))
        }
    }
}

fn parse_output_query(request: &Request) -> Result<OutputQuery, DaemonError> {
    let Some(payload) = request.json() else { return Ok(OutputQuery::default()) };

    let stream = match payload.get("stream").and_then(|v| v.as_str()) {
        None => None,
        Some("stdout") => Some(StreamKind::Stdout),
        Some("stderr") => Some(StreamKind::Stderr),
        Some(other) => {
            return Err(DaemonError::invalid_arg(format!("unknown stream {other:?}")))
        }
    };

    Ok(OutputQuery {
        stream,
        grep: payload.get("grep").and_then(|v| v.as_str()).map(str::to_string),
        head: payload.get("head").and_then(|v| v.as_u64()).map(|n| n as usize),
        tail: payload.get("tail").and_then(|v| v.as_u64()).map(|n| n as usize),
    })
}

fn bad(e: devtool_wire::ProtocolError) -> Response {
    DaemonError::invalid_arg(e.to_string()).into()
}
