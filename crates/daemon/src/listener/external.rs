// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `CHAOS` and `TUNNEL` sub-verb handlers.
//!
//! Both surfaces are contracts fulfilled by out-of-core collaborators;
//! the daemon only routes.

use super::{ConnState, ListenCtx};
use devtool_core::DaemonError;
use devtool_wire::{ChaosCmd, Request, Response, TunnelCmd};
use std::sync::Arc;

pub(super) async fn handle_chaos(
    cmd: ChaosCmd,
    request: &Request,
    ctx: &Arc<ListenCtx>,
) -> Response {
    match ctx.chaos.handle(cmd, &request.args, request.json()).await {
        Ok(value) => Response::Json(value),
        Err(e) => e.into(),
    }
}

pub(super) async fn handle_tunnel(
    cmd: TunnelCmd,
    request: &Request,
    ctx: &Arc<ListenCtx>,
    conn: &mut ConnState,
) -> Response {
    match cmd {
        TunnelCmd::Start => {
            let Some(query) = request.args.first() else {
                return DaemonError::invalid_arg("START requires a proxy id").into();
            };
            let proxy =
                match ctx.engine.manager().resolve(query, conn.attached_path.as_deref()) {
                    Ok(proxy) => proxy,
                    Err(e) => return e.into(),
                };
            let Some(addr) = proxy.listen_addr() else {
                return DaemonError::unavailable(format!("proxy {} is not listening", proxy.id))
                    .into();
            };
            match ctx.tunnels.start(proxy.id.as_str(), &addr.to_string()).await {
                Ok(value) => Response::Json(value),
                Err(e) => e.into(),
            }
        }

        TunnelCmd::Stop => match request.args.first() {
            Some(id) => match ctx.tunnels.stop(id).await {
                Ok(()) => Response::Ok,
                Err(e) => e.into(),
            },
            None => DaemonError::invalid_arg("STOP requires a tunnel id").into(),
        },

        TunnelCmd::Status => match request.args.first() {
            Some(id) => match ctx.tunnels.status(id).await {
                Ok(value) => Response::Json(value),
                Err(e) => e.into(),
            },
            None => DaemonError::invalid_arg("STATUS requires a tunnel id").into(),
        },

        TunnelCmd::List => match ctx.tunnels.list().await {
            Ok(value) => Response::Json(value),
            Err(e) => e.into(),
        },
    }
}
