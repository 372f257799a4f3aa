// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::proxy::{ProxyOptions, DEFAULT_MAX_LOG_SIZE};
use devtool_core::ErrorKind;
use std::path::PathBuf;

fn proxy(id: &str, path: &str) -> Arc<ProxyServer> {
    ProxyServer::new(ProxyOptions {
        id: ProxyId::new(id),
        target_url: "http://localhost:5173/".to_string(),
        project_path: PathBuf::from(path),
        max_log_size: DEFAULT_MAX_LOG_SIZE,
        overlay_socket: None,
    })
    .unwrap()
}

#[test]
fn insert_rejects_duplicates() {
    let manager = ProxyManager::default();
    manager.insert(proxy("a-1:dev:localhost-5173", "/a")).unwrap();
    let err = manager.insert(proxy("a-1:dev:localhost-5173", "/a")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Exists);
    assert_eq!(manager.count(), 1);
}

#[test]
fn exact_id_lookup_bypasses_scoping() {
    let manager = ProxyManager::default();
    manager.insert(proxy("a-1:dev:localhost-3000", "/a")).unwrap();

    let found = manager
        .resolve("a-1:dev:localhost-3000", Some(Path::new("/elsewhere")))
        .unwrap();
    assert_eq!(found.id, "a-1:dev:localhost-3000");
}

#[test]
fn fuzzy_matches_any_component() {
    let manager = ProxyManager::default();
    manager.insert(proxy("a-1:dev:localhost-3000", "/a")).unwrap();

    for query in ["a-1", "dev", "localhost-3000"] {
        let found = manager.resolve(query, None).unwrap();
        assert_eq!(found.id, "a-1:dev:localhost-3000", "query {query:?}");
    }
}

#[test]
fn fuzzy_ambiguity_is_an_error() {
    let manager = ProxyManager::default();
    manager.insert(proxy("a-1:dev:localhost-3000", "/a")).unwrap();
    manager.insert(proxy("b-2:dev:localhost-4000", "/b")).unwrap();

    let err = manager.resolve("dev", None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Ambiguous);
}

#[test]
fn session_path_disambiguates() {
    let manager = ProxyManager::default();
    manager.insert(proxy("a-1:dev:localhost-3000", "/path/a")).unwrap();
    manager.insert(proxy("b-2:dev:localhost-4000", "/path/b")).unwrap();

    let found = manager.resolve("dev", Some(Path::new("/path/a"))).unwrap();
    assert_eq!(found.id, "a-1:dev:localhost-3000");

    // Without attachment the same query is ambiguous.
    assert_eq!(manager.resolve("dev", None).unwrap_err().kind, ErrorKind::Ambiguous);

    // A path with no matching proxies resolves nothing.
    assert_eq!(
        manager.resolve("dev", Some(Path::new("/path/c"))).unwrap_err().kind,
        ErrorKind::NotFound
    );
}

#[test]
fn unknown_query_is_not_found() {
    let manager = ProxyManager::default();
    manager.insert(proxy("a-1:dev:localhost-3000", "/a")).unwrap();
    assert_eq!(manager.resolve("api", None).unwrap_err().kind, ErrorKind::NotFound);
}

#[test]
fn list_is_sorted_and_path_filtered() {
    let manager = ProxyManager::default();
    manager.insert(proxy("b-2:dev:localhost-4000", "/b")).unwrap();
    manager.insert(proxy("a-1:dev:localhost-3000", "/a")).unwrap();

    let all = manager.list(None);
    assert_eq!(all.len(), 2);
    assert!(all[0].id < all[1].id);

    let scoped = manager.list(Some(Path::new("/a")));
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].id, "a-1:dev:localhost-3000");
}

#[test]
fn snapshot_list_captures_persisted_fields() {
    let manager = ProxyManager::default();
    manager.insert(proxy("a-1:dev:localhost-3000", "/a")).unwrap();

    let snapshot = manager.snapshot_list();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "a-1:dev:localhost-3000");
    assert_eq!(snapshot[0].target_url, "http://localhost:5173/");
    assert_eq!(snapshot[0].path, PathBuf::from("/a"));
    assert_eq!(snapshot[0].port, 0, "never started, no bound port");
}

#[tokio::test]
async fn stop_all_clears_the_registry() {
    let manager = ProxyManager::default();
    let p = proxy("a-1:dev:localhost-3000", "/a");
    p.start(None).await.unwrap();
    manager.insert(Arc::clone(&p)).unwrap();

    manager.stop_all(Duration::from_secs(2)).await;
    assert_eq!(manager.count(), 0);
    assert!(!p.is_running());
}
