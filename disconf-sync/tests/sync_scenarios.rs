use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use disconf_core::{ClientOptions, ConfigKey, FetchConfig};
use disconf_sync::{
    Coordinator, Endpoints, FetchError, HttpFetcher, HttpResponse, HttpTransport,
    MemoryCoordinator, SyncError, SyncEvent, SyncHandle, SyncOrchestrator, WatchEvent,
};
use tempfile::TempDir;

const ROOT: &str = "/disconf/node_demo_1_0_0_test";

/// Registry stand-in keyed by request path (query included).
#[derive(Default)]
struct Registry {
    routes: Mutex<HashMap<String, (u16, String)>>,
    calls: Mutex<Vec<String>>,
}

impl Registry {
    fn new() -> Arc<Self> {
        let registry = Arc::new(Self::default());
        registry.route(
            "/api/zoo/hosts",
            200,
            r#"{"status":1,"message":"","value":"127.0.0.1:4180,127.0.0.1:4181"}"#,
        );
        registry.route("/api/zoo/prefix", 200, r#"{"status":1,"message":"","value":"/disconf"}"#);
        registry
    }

    fn route(&self, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
    }

    fn file(&self, name: &str, status: u16, body: &str) {
        self.route(
            &format!("/api/config/file?app=node_demo&version=1_0_0&env=test&key={name}"),
            status,
            body,
        );
    }

    fn item(&self, name: &str, value: &str) {
        self.route(
            &format!("/api/config/item?app=node_demo&version=1_0_0&env=test&key={name}"),
            200,
            &format!(r#"{{"status":1,"message":"","value":"{value}"}}"#),
        );
    }

    fn config_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.contains("/api/config/"))
            .count()
    }
}

impl HttpTransport for Registry {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if url.starts_with("http://down") {
            return Err(FetchError::Transport {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        let path = url.trim_start_matches("http://").splitn(2, '/').nth(1).unwrap_or("");
        match self.routes.lock().unwrap().get(&format!("/{path}")) {
            Some((status, body)) => Ok(HttpResponse {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(HttpResponse {
                status: 404,
                body: String::new(),
            }),
        }
    }
}

fn options(base: &Path, files: &[&str], items: &[&str]) -> ClientOptions {
    let mut opts = ClientOptions::defaults_at(base).expect("defaults");
    opts.enable_remote = true;
    opts.server_hosts = "conf:8080".into();
    opts.app = "node_demo".into();
    opts.version = "1_0_0".into();
    opts.env = "test".into();
    opts.file_names = files.iter().map(|s| s.to_string()).collect();
    opts.item_names = items.iter().map(|s| s.to_string()).collect();
    opts.ignore.clear();
    opts.retry_times = 0;
    opts.retry_sleep_seconds = 0.0;
    opts
}

async fn next(handle: &mut SyncHandle) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(5), handle.next_event())
        .await
        .expect("event within timeout")
        .expect("engine still running")
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bootstrap_fails_over_to_second_host() {
    let registry = Registry::new();
    let fetcher = HttpFetcher::with_transport(
        Endpoints::parse("down:1,conf:8080"),
        FetchConfig {
            retry_times_per_host: 1,
            retry_sleep: Duration::ZERO,
        },
        registry.clone(),
    );

    let body = fetcher.fetch("/api/zoo/hosts").await.expect("fetch");
    assert_eq!(
        body.value_text().as_deref(),
        Some("127.0.0.1:4180,127.0.0.1:4181")
    );
    assert_eq!(registry.calls.lock().unwrap().len(), 3);
}

// ---------------------------------------------------------------------------
// Ready
// ---------------------------------------------------------------------------

#[tokio::test]
async fn file_key_lands_in_destination_and_ready_snapshot() {
    let tmp = TempDir::new().expect("tempdir");
    let registry = Registry::new();
    registry.file("demo.properties", 200, "name=demo\nversion=v1.0.0\n");
    let opts = options(tmp.path(), &["demo.properties"], &[]);
    let dist = opts.dist_file.clone();

    let orchestrator =
        SyncOrchestrator::new(opts, MemoryCoordinator::new()).with_transport(registry);
    let mut handle = orchestrator.start().await.expect("start");

    match next(&mut handle).await {
        SyncEvent::Ready(Some(snapshot)) => {
            assert_eq!(snapshot.get("name"), Some("demo"));
            assert_eq!(snapshot.get("version"), Some("v1.0.0"));
        }
        other => panic!("expected ready, got {other:?}"),
    }
    let written = fs::read_to_string(&dist).expect("destination written");
    assert!(written.contains("name=demo"));
    assert!(written.contains("version=v1.0.0"));
    assert_eq!(
        fs::read_to_string(tmp.path().join("download").join("demo.properties")).unwrap(),
        "name=demo\nversion=v1.0.0\n"
    );
}

#[tokio::test]
async fn item_key_is_wrapped_as_single_pair() {
    let tmp = TempDir::new().expect("tempdir");
    let registry = Registry::new();
    registry.item("test", "hello");

    let orchestrator = SyncOrchestrator::new(options(tmp.path(), &[], &["test"]), MemoryCoordinator::new())
        .with_transport(registry);
    let mut handle = orchestrator.start().await.expect("start");

    match next(&mut handle).await {
        SyncEvent::Ready(Some(snapshot)) => {
            assert_eq!(snapshot.iter().collect::<Vec<_>>(), vec![("test", "hello")]);
        }
        other => panic!("expected ready, got {other:?}"),
    }
}

#[tokio::test]
async fn disabled_remote_touches_nothing() {
    let tmp = TempDir::new().expect("tempdir");
    let registry = Registry::new();
    let store = MemoryCoordinator::new();
    let mut opts = options(tmp.path(), &["demo.properties"], &["test"]);
    opts.enable_remote = false;

    let orchestrator = SyncOrchestrator::new(opts, store.clone()).with_transport(registry.clone());
    let mut handle = orchestrator.start().await.expect("start");

    assert!(matches!(next(&mut handle).await, SyncEvent::Ready(None)));
    assert_eq!(store.connect_count(), 0);
    assert!(registry.calls.lock().unwrap().is_empty());
    assert!(!tmp.path().join("remote.properties").exists());
}

#[tokio::test]
async fn ignored_name_is_never_fetched() {
    let tmp = TempDir::new().expect("tempdir");
    let registry = Registry::new();
    registry.file("system.properties", 200, "mode=prod\n");
    registry.item("demo.properties", "x");
    let mut opts = options(tmp.path(), &["demo.properties", "system.properties"], &["demo.properties"]);
    opts.ignore = vec!["demo.properties".into()];

    let orchestrator =
        SyncOrchestrator::new(opts, MemoryCoordinator::new()).with_transport(registry.clone());
    let mut handle = orchestrator.start().await.expect("start");
    let snapshot = handle.wait_ready().await.expect("ready").expect("snapshot");

    assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["mode"]);
    assert_eq!(registry.config_calls(), 1);
}

// ---------------------------------------------------------------------------
// Isolation and changes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_node_does_not_stop_its_siblings() {
    let tmp = TempDir::new().expect("tempdir");
    let registry = Registry::new();
    let store = MemoryCoordinator::new();
    registry.file("good.properties", 200, "good=1\n");
    registry.file("bad.properties", 500, "");
    let opts = options(tmp.path(), &["good.properties", "bad.properties"], &[]);
    let dist = opts.dist_file.clone();

    let orchestrator = SyncOrchestrator::new(opts, store.clone()).with_transport(registry.clone());
    let mut handle = orchestrator.start().await.expect("start");

    match next(&mut handle).await {
        SyncEvent::Error(SyncError::Node { key, .. }) => assert_eq!(key, "file:bad.properties"),
        other => panic!("expected node error, got {other:?}"),
    }
    assert!(!dist.exists(), "not ready while one key has never succeeded");

    registry.file("bad.properties", 200, "bad=fixed\n");
    store
        .set_data(&format!("{ROOT}/file/bad.properties"), b"poke")
        .await
        .expect("poke");

    match next(&mut handle).await {
        SyncEvent::Ready(Some(snapshot)) => {
            assert_eq!(snapshot.get("good"), Some("1"));
            assert_eq!(snapshot.get("bad"), Some("fixed"));
        }
        other => panic!("expected ready, got {other:?}"),
    }
}

#[tokio::test]
async fn remote_change_rewrites_destination_and_emits_change() {
    let tmp = TempDir::new().expect("tempdir");
    let registry = Registry::new();
    let store = MemoryCoordinator::new();
    registry.file("app.properties", 200, "pool=5\nname=app\n");
    registry.item("timeout", "30");
    let opts = options(tmp.path(), &["app.properties"], &["timeout"]);
    let dist = opts.dist_file.clone();

    let orchestrator = SyncOrchestrator::new(opts, store.clone()).with_transport(registry.clone());
    let mut handle = orchestrator.start().await.expect("start");
    handle.wait_ready().await.expect("ready");

    registry.file("app.properties", 200, "pool=10\n");
    let path = format!("{ROOT}/file/app.properties");
    store.set_data(&path, b"changed").await.expect("set");

    match next(&mut handle).await {
        SyncEvent::Change {
            key,
            cause,
            payload,
        } => {
            assert_eq!(key, ConfigKey::file("app.properties"));
            assert_eq!(cause, WatchEvent::DataChanged { path });
            assert_eq!(payload.get("pool"), Some("10"));
        }
        other => panic!("expected change, got {other:?}"),
    }

    let written = disconf_core::properties::parse(&fs::read_to_string(&dist).unwrap());
    assert_eq!(written.get("pool"), Some("10"));
    // Keys missing from the new payload keep their previous values.
    assert_eq!(written.get("name"), Some("app"));
    assert_eq!(written.get("timeout"), Some("30"));
}

#[tokio::test]
async fn presence_nodes_exist_per_key_and_vanish_with_session() {
    let tmp = TempDir::new().expect("tempdir");
    let registry = Registry::new();
    let store = MemoryCoordinator::new();
    registry.item("a", "1");
    registry.item("b", "2");

    let orchestrator = SyncOrchestrator::new(options(tmp.path(), &[], &["a", "b"]), store.clone())
        .with_transport(registry);
    let mut handle = orchestrator.start().await.expect("start");
    handle.wait_ready().await.expect("ready");

    for name in ["a", "b"] {
        assert_eq!(store.children(&format!("{ROOT}/item/{name}")).len(), 1);
    }

    store.expire_session();
    for _ in 0..2 {
        assert!(matches!(next(&mut handle).await, SyncEvent::Error(_)));
    }
    for name in ["a", "b"] {
        assert!(store.children(&format!("{ROOT}/item/{name}")).is_empty());
    }
    // Both nodes ended, so the aggregator stops and the stream closes.
    assert!(handle.next_event().await.is_none());
}
