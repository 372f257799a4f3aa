// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Each accepted connection runs on its own task and holds its own
//! state: an attached project path for fuzzy scoping, and at most one
//! registered session whose lifecycle ends with the connection.

mod external;
mod misc;
mod proc;
mod proxy;
mod session;
mod store;

use crate::adapters::{ChaosAdapter, ProjectConfigSource, ProjectDetector, TunnelAdapter};
use crate::engine::Engine;
use crate::event_bus::EventBus;
use crate::overlay::OverlayEndpoint;
use crate::scheduler::Scheduler;
use crate::session::SessionRegistry;
use crate::storage::StateStore;
use crate::store::KvStore;
use crate::supervisor::Supervisor;
use devtool_core::{SessionCode, SystemClock};
use devtool_wire::{
    read_request, write_response, ProtocolError, Request, Response, Verb,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub supervisor: Arc<Supervisor>,
    pub engine: Arc<Engine<SystemClock>>,
    pub sessions: Arc<SessionRegistry<SystemClock>>,
    pub scheduler: Arc<Scheduler<SystemClock>>,
    pub kv: Arc<KvStore>,
    pub overlay: Arc<OverlayEndpoint>,
    pub state: Option<Arc<StateStore>>,
    pub bus: EventBus,
    pub tunnels: Arc<dyn TunnelAdapter>,
    pub chaos: Arc<dyn ChaosAdapter>,
    pub detector: Arc<dyn ProjectDetector>,
    pub config: Arc<dyn ProjectConfigSource>,
    pub socket_path: PathBuf,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
}

/// Per-connection state.
#[derive(Default)]
pub struct ConnState {
    /// Project path used to scope fuzzy proxy lookup.
    pub attached_path: Option<PathBuf>,
    /// Session registered by this connection, if any.
    pub registered: Option<SessionCode>,
}

/// Listener task for accepting socket connections.
pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Accept loop; spawns one task per connection.
    pub async fn run(self, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                result = self.unix.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let ctx = Arc::clone(&self.ctx);
                            let conn_token = token.clone();
                            tokio::spawn(async move {
                                let (reader, writer) = stream.into_split();
                                handle_connection(reader, writer, ctx, conn_token).await;
                            });
                        }
                        Err(e) => error!("accept error: {}", e),
                    }
                }
            }
        }
        debug!("listener stopped");
    }
}

/// Serve one client until it disconnects or the daemon shuts down.
///
/// Generic over reader/writer so the spec suite can drive an in-memory
/// duplex instead of a real socket.
pub async fn handle_connection<R, W>(
    reader: R,
    mut writer: W,
    ctx: Arc<ListenCtx>,
    token: CancellationToken,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut conn = ConnState::default();

    loop {
        let request = tokio::select! {
            _ = token.cancelled() => break,
            // Idle connections are fine: sessions stay bound to them.
            request = read_request(&mut reader, IDLE_TIMEOUT) => request,
        };

        let request = match request {
            Ok(request) => request,
            Err(ProtocolError::Timeout) => continue,
            Err(ProtocolError::ConnectionClosed) => break,
            Err(e) => {
                debug!(error = %e, "malformed request");
                let response = Response::err(
                    devtool_core::ErrorKind::InvalidArg,
                    e.to_string(),
                );
                if write_response(&mut writer, &response, devtool_wire::DEFAULT_TIMEOUT)
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };

        debug!(verb = ?request.verb, args = ?request.args, "request");
        let response = dispatch(request, &ctx, &mut conn).await;

        if write_response(&mut writer, &response, devtool_wire::DEFAULT_TIMEOUT).await.is_err() {
            break;
        }
    }

    // Connection gone: a registered session's lifecycle ends with it.
    if let Some(code) = conn.registered.take() {
        info!(code = %code, "connection closed, ending its session");
        session::end_session(&ctx, &code).await;
    }
}

/// An hour of silence on an idle connection before we re-poll the
/// cancellation token. Not a protocol deadline.
const IDLE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(3600);

/// Single dispatch point for every verb.
pub async fn dispatch(request: Request, ctx: &Arc<ListenCtx>, conn: &mut ConnState) -> Response {
    match request.verb {
        Verb::Ping => Response::Ok,
        Verb::Info => misc::handle_info(ctx),
        Verb::Detect => misc::handle_detect(&request, ctx, conn).await,
        Verb::Run => misc::handle_run(&request, ctx, conn).await,
        Verb::Proc(cmd) => proc::handle(cmd, &request, ctx, conn).await,
        Verb::Proxy(cmd) => proxy::handle_proxy(cmd, &request, ctx, conn).await,
        Verb::ProxyLog(cmd) => proxy::handle_proxylog(cmd, &request, ctx, conn),
        Verb::CurrentPage(cmd) => proxy::handle_currentpage(cmd, &request, ctx, conn),
        Verb::Session(cmd) => session::handle(cmd, &request, ctx, conn).await,
        Verb::Overlay(cmd) => store::handle_overlay(cmd, &request, ctx),
        Verb::Store(cmd) => store::handle_store(cmd, &request, ctx),
        Verb::Chaos(cmd) => external::handle_chaos(cmd, &request, ctx).await,
        Verb::Tunnel(cmd) => external::handle_tunnel(cmd, &request, ctx, conn).await,
    }
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
