// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SESSION` sub-verb handlers and session-end cleanup.

use super::{ConnState, ListenCtx};
use devtool_core::{
    Clock, DaemonError, Event, ScriptId, SessionCode, SessionRecord, SessionStatus, TaskId,
};
use devtool_wire::{Request, Response, SessionCmd};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// JSON payload for `SESSION REGISTER`.
#[derive(Debug, Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    code: Option<String>,
    overlay_socket: PathBuf,
    project_path: PathBuf,
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

pub(super) async fn handle(
    cmd: SessionCmd,
    request: &Request,
    ctx: &Arc<ListenCtx>,
    conn: &mut ConnState,
) -> Response {
    match cmd {
        SessionCmd::Register => handle_register(request, ctx, conn).await,

        SessionCmd::Unregister => {
            let Some(code) = request.args.first() else {
                return DaemonError::invalid_arg("UNREGISTER requires a code").into();
            };
            let code = SessionCode::new(code.as_str());
            if !ctx.sessions.list().iter().any(|s| s.code == code) {
                return DaemonError::not_found(format!("no session {code}")).into();
            }
            end_session(ctx, &code).await;
            if conn.registered.as_ref() == Some(&code) {
                conn.registered = None;
            }
            Response::Ok
        }

        SessionCmd::List => Response::json(&ctx.sessions.list()),

        SessionCmd::Get => match request.args.first() {
            Some(code) => ctx.sessions.get(&SessionCode::new(code.as_str())).into(),
            None => DaemonError::invalid_arg("GET requires a code").into(),
        },

        SessionCmd::Heartbeat => match request.args.first() {
            Some(code) => match ctx.sessions.heartbeat(&SessionCode::new(code.as_str())) {
                Ok(()) => Response::Ok,
                Err(e) => e.into(),
            },
            None => DaemonError::invalid_arg("HEARTBEAT requires a code").into(),
        },

        SessionCmd::GenerateCode => {
            let prefix = request.args.first().map(String::as_str).unwrap_or("session");
            let code = ctx.sessions.generate_code(prefix);
            Response::json(&serde_json::json!({ "code": code }))
        }

        SessionCmd::Find => match request.args.first() {
            Some(path) => match ctx.sessions.find_by_path(Path::new(path)) {
                Some(record) => Response::json(&record),
                None => DaemonError::not_found(format!("no session for {path}")).into(),
            },
            None => DaemonError::invalid_arg("FIND requires a path").into(),
        },

        SessionCmd::Send => {
            let (Some(code), Some(message)) = (request.args.first(), request.args.get(1))
            else {
                return DaemonError::invalid_arg("SEND requires a code and message").into();
            };
            match ctx.scheduler.send_now(&SessionCode::new(code.as_str()), message).await {
                Ok(()) => Response::Ok,
                Err(e) => e.into(),
            }
        }

        SessionCmd::Schedule => handle_schedule(request, ctx, conn),

        SessionCmd::Cancel => match request.args.first() {
            Some(id) => match ctx.scheduler.cancel(&TaskId::new(id.as_str())) {
                Ok(()) => Response::Ok,
                Err(e) => e.into(),
            },
            None => DaemonError::invalid_arg("CANCEL requires a task id").into(),
        },

        SessionCmd::Tasks => {
            let scope = match request.args.first() {
                Some(path) => Some(PathBuf::from(path)),
                None => conn.attached_path.clone(),
            };
            Response::json(&ctx.scheduler.list_pending(scope.as_deref()))
        }

        SessionCmd::Attach => match request.args.first() {
            Some(path) => {
                let path = PathBuf::from(path);
                let session = ctx.sessions.find_by_path(&path).map(|s| s.code);
                conn.attached_path = Some(path.clone());
                Response::json(&serde_json::json!({ "path": path, "session": session }))
            }
            None => DaemonError::invalid_arg("ATTACH requires a path").into(),
        },
    }
}

async fn handle_register(
    request: &Request,
    ctx: &Arc<ListenCtx>,
    conn: &mut ConnState,
) -> Response {
    let payload: RegisterRequest = match request.json() {
        Some(payload) => match serde_json::from_value(payload.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                return DaemonError::invalid_arg(format!("bad REGISTER payload: {e}")).into()
            }
        },
        None => return DaemonError::invalid_arg("REGISTER requires a JSON payload").into(),
    };

    let code = match payload.code {
        Some(code) => SessionCode::new(code),
        None => {
            let stem =
                payload.command.rsplit('/').next().unwrap_or(&payload.command).to_string();
            ctx.sessions.generate_code(&stem)
        }
    };

    let now = ctx.sessions.clock().now_utc();
    let record = SessionRecord {
        code: code.clone(),
        overlay_socket: payload.overlay_socket,
        project_path: payload.project_path.clone(),
        command: payload.command,
        args: payload.args,
        started_at: now,
        status: SessionStatus::Active,
        last_seen: now,
    };

    if let Err(e) = ctx.sessions.register(record.clone()) {
        return e.into();
    }
    conn.registered = Some(code.clone());
    conn.attached_path = Some(payload.project_path.clone());

    autostart(ctx, &payload.project_path).await;

    Response::json(&record)
}

/// Spawn the project's autostart commands and proxies.
async fn autostart(ctx: &Arc<ListenCtx>, project_path: &Path) {
    let config = match ctx.config.load(project_path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %project_path.display(), error = %e, "autostart config load failed");
            return;
        }
    };

    for command in config.commands.iter().filter(|c| c.autostart) {
        let start = crate::supervisor::StartConfig {
            id: devtool_core::script_id(project_path, &command.name),
            project_path: project_path.to_path_buf(),
            command: command.command.clone(),
            args: command.args.clone(),
            env: command.env.clone(),
            line_matchers: vec![],
        };
        match ctx.supervisor.start_or_reuse(start).await {
            Ok(entry) => info!(id = %entry.id, "autostarted command"),
            Err(e) => warn!(command = %command.name, error = %e, "autostart failed"),
        }
    }

    for proxy in config.proxies.iter().filter(|p| p.autostart) {
        ctx.bus.send(Event::ExplicitStart {
            proxy_id: String::new(),
            config: proxy.clone(),
            path: project_path.to_path_buf(),
        });
    }
}

/// `SESSION SCHEDULE <code> <delay> <message>`.
fn handle_schedule(request: &Request, ctx: &Arc<ListenCtx>, conn: &mut ConnState) -> Response {
    let (Some(code), Some(delay), Some(message)) =
        (request.args.first(), request.args.get(1), request.args.get(2))
    else {
        return DaemonError::invalid_arg("SCHEDULE requires code, delay, message").into();
    };

    let delay = match parse_delay(delay) {
        Some(delay) => delay,
        None => return DaemonError::invalid_arg(format!("bad delay {delay:?}")).into(),
    };

    let project_path = conn
        .attached_path
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("/"));

    let deliver_at = ctx.sessions.clock().now_utc()
        + chrono::Duration::from_std(delay).unwrap_or_default();

    match ctx.scheduler.schedule(
        SessionCode::new(code.as_str()),
        message.clone(),
        deliver_at,
        project_path,
    ) {
        Ok(task_id) => Response::json(&serde_json::json!({ "task_id": task_id })),
        Err(e) => e.into(),
    }
}

/// `100ms`, `5s`, `2m`, `1h`, or bare seconds.
fn parse_delay(s: &str) -> Option<std::time::Duration> {
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => s.split_at(split),
        None => (s, "s"),
    };
    let n: u64 = digits.parse().ok()?;
    match unit {
        "ms" => Some(std::time::Duration::from_millis(n)),
        "s" => Some(std::time::Duration::from_secs(n)),
        "m" => Some(std::time::Duration::from_secs(n * 60)),
        "h" => Some(std::time::Duration::from_secs(n * 3600)),
        _ => None,
    }
}

/// End a session: stop its project's processes and proxies, then
/// unregister. Used by both explicit UNREGISTER and connection close.
pub(super) async fn end_session(ctx: &Arc<ListenCtx>, code: &SessionCode) {
    let Ok(record) = ctx.sessions.get(code) else { return };

    let stopped_processes: Vec<ScriptId> =
        ctx.supervisor.stop_by_project_path(&record.project_path).await;
    let stopped_proxies = ctx.engine.stop_by_project_path(&record.project_path);
    let _ = ctx.sessions.unregister(code);

    info!(
        code = %code,
        processes = stopped_processes.len(),
        proxies = stopped_proxies.len(),
        "session ended, project resources stopped"
    );
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
