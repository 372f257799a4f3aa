// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::StaticConfigSource;
use devtool_core::{ProjectConfig, SessionCode, SessionRecord, SessionStatus, SystemClock};

struct Fixture {
    engine: Arc<Engine<SystemClock>>,
    config: Arc<StaticConfigSource>,
    sessions: Arc<SessionRegistry<SystemClock>>,
    dir: tempfile::TempDir,
}

fn fixture(with_state: bool) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(StaticConfigSource::default());
    let sessions = Arc::new(SessionRegistry::new(SystemClock));
    let state =
        with_state.then(|| Arc::new(StateStore::open(dir.path().join("state.json"))));
    let engine = Arc::new(Engine::new(
        SystemClock,
        Arc::new(ProxyManager::default()),
        Arc::clone(&sessions),
        Arc::clone(&config) as Arc<dyn ProjectConfigSource>,
        Arc::new(OverlayEndpoint::default()),
        state,
    ));
    Fixture { engine, config, sessions, dir }
}

fn dev_config() -> ProjectConfig {
    ProjectConfig {
        proxies: vec![ProxyConfigEntry {
            name: "dev".to_string(),
            script: Some("dev".to_string()),
            ..Default::default()
        }],
        commands: vec![],
    }
}

#[tokio::test]
async fn url_detected_creates_a_configured_proxy() {
    let f = fixture(false);
    let project = f.dir.path().join("myapp");
    f.config.set(project.clone(), dev_config());

    let script = devtool_core::script_id(&project, "dev");
    f.engine
        .handle_event(Event::UrlDetected {
            script_id: script.clone(),
            url: "http://localhost:5173/".to_string(),
            path: project.clone(),
        })
        .await;

    let proxies = f.engine.manager().list(None);
    assert_eq!(proxies.len(), 1);
    assert_eq!(proxies[0].target_url, "http://localhost:5173/");
    assert!(proxies[0].running);
    let last_component = proxies[0].id.rsplit(':').next().unwrap();
    assert_eq!(last_component, "localhost-5173");

    assert_eq!(f.engine.associations(&script).len(), 1);

    // The same URL again is a no-op.
    f.engine
        .handle_event(Event::UrlDetected {
            script_id: script.clone(),
            url: "http://localhost:5173/".to_string(),
            path: project,
        })
        .await;
    assert_eq!(f.engine.manager().count(), 1);
}

#[tokio::test]
async fn unconfigured_scripts_get_no_proxy() {
    let f = fixture(false);
    let project = f.dir.path().join("myapp");
    // No config entry registered for this project.

    f.engine
        .handle_event(Event::UrlDetected {
            script_id: devtool_core::script_id(&project, "dev"),
            url: "http://localhost:5173/".to_string(),
            path: project,
        })
        .await;
    assert_eq!(f.engine.manager().count(), 0);
}

#[tokio::test]
async fn script_stopped_stops_its_proxies() {
    let f = fixture(false);
    let project = f.dir.path().join("myapp");
    f.config.set(project.clone(), dev_config());
    let script = devtool_core::script_id(&project, "dev");

    f.engine
        .handle_event(Event::UrlDetected {
            script_id: script.clone(),
            url: "http://localhost:5173/".to_string(),
            path: project,
        })
        .await;
    assert_eq!(f.engine.manager().count(), 1);

    f.engine.handle_event(Event::ScriptStopped { script_id: script.clone() }).await;
    assert_eq!(f.engine.manager().count(), 0);
    assert!(f.engine.associations(&script).is_empty());
}

#[tokio::test]
async fn explicit_start_resolves_target_precedence() {
    let f = fixture(false);
    let project = f.dir.path().join("myapp");

    let entry = ProxyConfigEntry {
        name: "api".to_string(),
        port: Some(39999),
        target: Some("http://localhost:40000/".to_string()),
        ..Default::default()
    };
    let proxy = f.engine.start_from_config(None, &entry, &project).await.unwrap();
    assert_eq!(proxy.target_url, "http://localhost:39999");

    let err = f.engine.start_from_config(None, &entry, &project).await.unwrap_err();
    assert_eq!(err.kind, devtool_core::ErrorKind::Exists);
}

#[tokio::test]
async fn proxy_binds_session_overlay_when_attached() {
    let f = fixture(false);
    let project = f.dir.path().join("myapp");
    let overlay_socket = f.dir.path().join("session-overlay.sock");

    f.sessions
        .register(SessionRecord {
            code: SessionCode::new("claude-1"),
            overlay_socket: overlay_socket.clone(),
            project_path: project.clone(),
            command: "claude".to_string(),
            args: vec![],
            started_at: chrono::Utc::now(),
            status: SessionStatus::Active,
            last_seen: chrono::Utc::now(),
        })
        .unwrap();

    let entry = ProxyConfigEntry {
        name: "dev".to_string(),
        url: Some("http://localhost:5173/".to_string()),
        ..Default::default()
    };
    let proxy = f.engine.start_from_config(None, &entry, &project).await.unwrap();
    assert_eq!(proxy.overlay_socket(), Some(overlay_socket));
}

#[tokio::test]
async fn stop_by_project_path_is_scoped_and_persisted() {
    let f = fixture(true);
    let a = f.dir.path().join("a");
    let b = f.dir.path().join("b");

    for (name, path, port) in [("dev", &a, 5173), ("dev", &b, 5174)] {
        let entry = ProxyConfigEntry {
            name: name.to_string(),
            url: Some(format!("http://localhost:{port}/")),
            ..Default::default()
        };
        f.engine.start_from_config(None, &entry, path).await.unwrap();
    }
    assert_eq!(f.engine.manager().count(), 2);

    let stopped = f.engine.stop_by_project_path(&a);
    assert_eq!(stopped.len(), 1);
    assert_eq!(f.engine.manager().count(), 1);

    // Snapshot only records the surviving proxy.
    let store = StateStore::open(f.dir.path().join("state.json"));
    assert_eq!(store.restore_list().len(), 1);
    assert!(store.restore_list()[0].path == b);
}

#[tokio::test]
async fn snapshot_restore_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let project = dir.path().join("myapp");

    // First engine: create a proxy, snapshot lands on disk.
    {
        let f_state = Arc::new(StateStore::open(state_path.clone()));
        let engine = Engine::new(
            SystemClock,
            Arc::new(ProxyManager::default()),
            Arc::new(SessionRegistry::new(SystemClock)),
            Arc::new(StaticConfigSource::default()) as Arc<dyn ProjectConfigSource>,
            Arc::new(OverlayEndpoint::default()),
            Some(f_state),
        );
        let entry = ProxyConfigEntry {
            name: "dev".to_string(),
            url: Some("http://localhost:5173/".to_string()),
            ..Default::default()
        };
        let proxy = engine.start_from_config(None, &entry, &project).await.unwrap();
        proxy.stop();
    }
    // Let the stopped listener release its port before restoring.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    // Second engine restores it.
    let state = Arc::new(StateStore::open(state_path));
    let engine = Engine::new(
        SystemClock,
        Arc::new(ProxyManager::default()),
        Arc::new(SessionRegistry::new(SystemClock)),
        Arc::new(StaticConfigSource::default()) as Arc<dyn ProjectConfigSource>,
        Arc::new(OverlayEndpoint::default()),
        Some(state),
    );
    let restored = engine.restore_from_snapshot().await;
    assert_eq!(restored, 1);

    let proxies = engine.manager().list(None);
    assert_eq!(proxies.len(), 1);
    assert!(proxies[0].id.ends_with(":dev:localhost-5173"));
}

#[tokio::test]
async fn restart_keeps_identity_with_a_fresh_listener() {
    let f = fixture(false);
    let project = f.dir.path().join("myapp");
    let entry = ProxyConfigEntry {
        name: "dev".to_string(),
        url: Some("http://localhost:5173/".to_string()),
        ..Default::default()
    };
    let original = f.engine.start_from_config(None, &entry, &project).await.unwrap();
    let id = original.id.clone();

    let fresh = f.engine.restart_proxy(&original).await.unwrap();
    assert_eq!(fresh.id, id);
    assert!(fresh.is_running());
    assert!(!original.is_running());
    assert_eq!(f.engine.manager().count(), 1);
}
