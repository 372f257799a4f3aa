// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `PROXY`, `PROXYLOG`, and `CURRENTPAGE` sub-verb handlers.
//!
//! Every proxy-id argument goes through session-scoped fuzzy lookup:
//! the connection's attached path narrows candidates before ambiguity
//! is judged.

use super::{misc, ConnState, ListenCtx};
use crate::env;
use crate::proxy::ProxyServer;
use devtool_core::{DaemonError, LogFilter, ProxyConfigEntry, ProxyId};
use devtool_wire::{PageCmd, ProxyCmd, ProxyLogCmd, Request, Response};
use std::path::Path;
use std::sync::Arc;

fn resolve(
    request: &Request,
    ctx: &Arc<ListenCtx>,
    conn: &ConnState,
) -> Result<Arc<ProxyServer>, DaemonError> {
    let query = request
        .args
        .first()
        .ok_or_else(|| DaemonError::invalid_arg("missing proxy id"))?;
    ctx.engine.manager().resolve(query, conn.attached_path.as_deref())
}

pub(super) async fn handle_proxy(
    cmd: ProxyCmd,
    request: &Request,
    ctx: &Arc<ListenCtx>,
    conn: &mut ConnState,
) -> Response {
    match cmd {
        ProxyCmd::Start => handle_start(request, ctx, conn).await,

        ProxyCmd::Stop => match resolve(request, ctx, conn) {
            Ok(proxy) => {
                ctx.engine.stop_proxy(&proxy);
                Response::Ok
            }
            Err(e) => e.into(),
        },

        ProxyCmd::Status => match resolve(request, ctx, conn) {
            Ok(proxy) => Response::json(&proxy.summary()),
            Err(e) => e.into(),
        },

        ProxyCmd::List => {
            let path = request.args.first().map(|p| Path::new(p).to_path_buf());
            Response::json(&ctx.engine.manager().list(path.as_deref()))
        }

        ProxyCmd::Restart => match resolve(request, ctx, conn) {
            Ok(proxy) => match ctx.engine.restart_proxy(&proxy).await {
                Ok(fresh) => Response::json(&fresh.summary()),
                Err(e) => e.into(),
            },
            Err(e) => e.into(),
        },

        ProxyCmd::Exec => {
            let proxy = match resolve(request, ctx, conn) {
                Ok(proxy) => proxy,
                Err(e) => return e.into(),
            };
            let Some(code) = request.args.get(1) else {
                return DaemonError::invalid_arg("EXEC requires code").into();
            };
            match proxy.exec(code, env::exec_timeout()).await {
                Ok(outcome) => Response::json(&serde_json::json!({
                    "exec_id": outcome.exec_id,
                    "result": outcome.result,
                    "error": outcome.error,
                    "duration_ms": outcome.duration_ms,
                })),
                Err(e) => e.into(),
            }
        }

        ProxyCmd::Toast => {
            let proxy = match resolve(request, ctx, conn) {
                Ok(proxy) => proxy,
                Err(e) => return e.into(),
            };
            let Some(text) = request.args.get(1) else {
                return DaemonError::invalid_arg("TOAST requires a message").into();
            };
            let level = request.args.get(2).cloned().unwrap_or_else(|| "info".to_string());
            let agents = proxy
                .broadcast("toast", serde_json::json!({ "text": text, "level": level }));
            Response::json(&serde_json::json!({ "agents": agents }))
        }
    }
}

/// `PROXY START <name|id> [target-url]`, optional JSON config payload.
async fn handle_start(
    request: &Request,
    ctx: &Arc<ListenCtx>,
    conn: &mut ConnState,
) -> Response {
    let Some(name) = request.args.first().cloned() else {
        return DaemonError::invalid_arg("START requires a proxy name").into();
    };

    let mut entry: ProxyConfigEntry = match request.json() {
        Some(payload) => match serde_json::from_value(payload.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                return DaemonError::invalid_arg(format!("bad proxy config: {e}")).into()
            }
        },
        None => ProxyConfigEntry::default(),
    };

    // A full compound id pins the identity; a bare name becomes the
    // logical-name component of a composed id.
    let explicit_id = name.contains(':').then(|| ProxyId::new(name.clone()));
    if entry.name.is_empty() {
        entry.name = match name.split(':').nth(1) {
            Some(logical) if !logical.is_empty() => logical.to_string(),
            _ => name.clone(),
        };
    }
    if let Some(url) = request.args.get(1) {
        entry.url = Some(url.clone());
    }

    let path = match misc::effective_path(None, conn) {
        Ok(path) => path,
        Err(e) => return e.into(),
    };

    match ctx.engine.start_from_config(explicit_id, &entry, &path).await {
        Ok(proxy) => Response::json(&proxy.summary()),
        Err(e) => e.into(),
    }
}

pub(super) fn handle_proxylog(
    cmd: ProxyLogCmd,
    request: &Request,
    ctx: &Arc<ListenCtx>,
    conn: &mut ConnState,
) -> Response {
    let proxy = match resolve(request, ctx, conn) {
        Ok(proxy) => proxy,
        Err(e) => return e.into(),
    };

    match cmd {
        ProxyLogCmd::Query => {
            let filter: LogFilter = match request.json() {
                Some(payload) => match serde_json::from_value(payload.clone()) {
                    Ok(filter) => filter,
                    Err(e) => {
                        return DaemonError::invalid_arg(format!("bad filter: {e}")).into()
                    }
                },
                None => LogFilter::default(),
            };
            Response::json(&proxy.log.query(&filter))
        }

        ProxyLogCmd::Stats => {
            let stats = proxy.log.stats();
            Response::json(&serde_json::json!({
                "total_entries": stats.total_written,
                "available_entries": stats.available,
                "dropped": stats.dropped,
            }))
        }

        ProxyLogCmd::Summary => {
            let entries = proxy.log.query(&LogFilter::default());
            let mut by_kind = std::collections::BTreeMap::new();
            for entry in &entries {
                *by_kind.entry(entry.kind_str()).or_insert(0u64) += 1;
            }
            let stats = proxy.log.stats();
            Response::json(&serde_json::json!({
                "by_kind": by_kind,
                "total_entries": stats.total_written,
                "dropped": stats.dropped,
            }))
        }

        ProxyLogCmd::Clear => {
            proxy.log.clear();
            Response::Ok
        }
    }
}

pub(super) fn handle_currentpage(
    cmd: PageCmd,
    request: &Request,
    ctx: &Arc<ListenCtx>,
    conn: &mut ConnState,
) -> Response {
    let proxy = match resolve(request, ctx, conn) {
        Ok(proxy) => proxy,
        Err(e) => return e.into(),
    };

    match cmd {
        PageCmd::List => Response::json(&proxy.pages.list()),
        PageCmd::Get => {
            let Some(url) = request.args.get(1) else {
                return DaemonError::invalid_arg("GET requires a page url").into();
            };
            match proxy.pages.get(url) {
                Some(page) => Response::json(&page),
                None => DaemonError::not_found(format!("no page {url:?}")).into(),
            }
        }
        PageCmd::Summary => Response::Json(proxy.pages.summary()),
        PageCmd::Clear => {
            proxy.pages.clear();
            Response::Ok
        }
    }
}
