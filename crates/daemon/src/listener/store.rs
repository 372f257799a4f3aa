// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `OVERLAY` and `STORE` sub-verb handlers.

use super::ListenCtx;
use devtool_core::DaemonError;
use devtool_wire::{OverlayCmd, Request, Response, StoreCmd};
use std::path::PathBuf;
use std::sync::Arc;

pub(super) fn handle_overlay(cmd: OverlayCmd, request: &Request, ctx: &Arc<ListenCtx>) -> Response {
    match cmd {
        OverlayCmd::Set => {
            let Some(endpoint) = request.args.first() else {
                return DaemonError::invalid_arg("SET requires an endpoint path").into();
            };
            ctx.overlay.set(PathBuf::from(endpoint));
            if let Some(state) = &ctx.state {
                state.save_overlay(Some(endpoint.clone()), chrono::Utc::now());
            }
            Response::Ok
        }

        OverlayCmd::Get => {
            let endpoint = ctx
                .overlay
                .get()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            Response::json(&endpoint)
        }

        OverlayCmd::Clear => {
            ctx.overlay.clear();
            if let Some(state) = &ctx.state {
                state.save_overlay(None, chrono::Utc::now());
            }
            Response::Ok
        }

        OverlayCmd::Activity => {
            let data = request
                .json()
                .cloned()
                .unwrap_or_else(|| serde_json::json!({ "active": true }));
            let mut agents = 0;
            for summary in ctx.engine.manager().list(None) {
                if let Some(proxy) =
                    ctx.engine.manager().get(&devtool_core::ProxyId::new(summary.id))
                {
                    agents += proxy.broadcast("activity", data.clone());
                }
            }
            Response::json(&serde_json::json!({ "agents": agents }))
        }
    }
}

pub(super) fn handle_store(cmd: StoreCmd, request: &Request, ctx: &Arc<ListenCtx>) -> Response {
    match cmd {
        StoreCmd::Get => match request.args.first() {
            Some(key) => match ctx.kv.get(key) {
                Ok(entry) => Response::Json(entry.value),
                Err(e) => e.into(),
            },
            None => DaemonError::invalid_arg("GET requires a key").into(),
        },

        StoreCmd::Set => {
            let Some(key) = request.args.first() else {
                return DaemonError::invalid_arg("SET requires a key").into();
            };
            let value = match (request.json(), request.args.get(1)) {
                (Some(payload), _) => payload.clone(),
                // A bare argument is stored as a JSON string.
                (None, Some(arg)) => serde_json::Value::String(arg.clone()),
                (None, None) => {
                    return DaemonError::invalid_arg("SET requires a value").into()
                }
            };
            ctx.kv.set(key.clone(), value, chrono::Utc::now());
            Response::Ok
        }

        StoreCmd::Delete => match request.args.first() {
            Some(key) => match ctx.kv.delete(key) {
                Ok(()) => Response::Ok,
                Err(e) => e.into(),
            },
            None => DaemonError::invalid_arg("DELETE requires a key").into(),
        },

        StoreCmd::List => Response::json(&ctx.kv.keys()),

        StoreCmd::Clear => {
            ctx.kv.clear();
            Response::Ok
        }

        StoreCmd::GetAll => Response::json(&ctx.kv.all()),
    }
}
