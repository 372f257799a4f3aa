// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture: a fully wired daemon context without a socket.

use super::ListenCtx;
use crate::adapters::{
    NullChaosAdapter, NullDetector, NullTunnelAdapter, StaticConfigSource,
};
use crate::engine::Engine;
use crate::event_bus::EventBus;
use crate::overlay::OverlayEndpoint;
use crate::proxy::ProxyManager;
use crate::scheduler::Scheduler;
use crate::session::SessionRegistry;
use crate::store::KvStore;
use crate::supervisor::{PidTracker, Supervisor};
use devtool_core::SystemClock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub(crate) struct TestDaemon {
    pub ctx: Arc<ListenCtx>,
    pub config: Arc<StaticConfigSource>,
    pub token: CancellationToken,
    pub dir: tempfile::TempDir,
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Build a daemon context on temp state, with the engine task running.
pub(crate) fn test_daemon() -> TestDaemon {
    let dir = tempfile::tempdir().unwrap();
    let (tracker, _) = PidTracker::open(dir.path().join("pids.json"), std::process::id());
    let supervisor = Arc::new(Supervisor::new(Arc::new(tracker), Duration::from_millis(300)));

    let sessions = Arc::new(SessionRegistry::new(SystemClock));
    let overlay = Arc::new(OverlayEndpoint::default());
    let config = Arc::new(StaticConfigSource::default());
    let manager = Arc::new(ProxyManager::default());
    let engine = Arc::new(Engine::new(
        SystemClock,
        manager,
        Arc::clone(&sessions),
        Arc::clone(&config) as Arc<dyn crate::adapters::ProjectConfigSource>,
        Arc::clone(&overlay),
        None,
    ));
    let scheduler = Arc::new(Scheduler::new(SystemClock, Arc::clone(&sessions), None));

    let (bus, reader) = EventBus::new();
    let token = CancellationToken::new();
    tokio::spawn(Arc::clone(&engine).run(reader, token.clone()));

    let ctx = Arc::new(ListenCtx {
        supervisor,
        engine,
        sessions,
        scheduler,
        kv: Arc::new(KvStore::ephemeral()),
        overlay,
        state: None,
        bus,
        tunnels: Arc::new(NullTunnelAdapter),
        chaos: Arc::new(NullChaosAdapter),
        detector: Arc::new(NullDetector),
        config: Arc::clone(&config) as Arc<dyn crate::adapters::ProjectConfigSource>,
        socket_path: dir.path().join("devtool-mcp.sock"),
        start_time: Instant::now(),
        shutdown: Arc::new(Notify::new()),
    });

    TestDaemon { ctx, config, token, dir }
}
