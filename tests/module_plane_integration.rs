//! Boots a real `ModulePlane` against fake child-process modules and
//! exercises the end-to-end scenarios from spec.md §8 directly — no HTTP
//! server or database needed, since C1–C6 don't depend on either.

use module_plane_core::config::Config;
use module_plane_core::error::AppError;
use module_plane_core::module_plane::ModulePlane;
use serde_json::json;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tempfile::TempDir;

fn base_config(modules_root: &std::path::Path) -> Config {
    let raw = format!(
        r#"{{"pg_url":"postgres://unused","secret_key":"integration-test-secret","modules_root":"{}"}}"#,
        modules_root.display()
    );
    serde_json::from_str(&raw).expect("config literal must deserialize")
}

fn write_manifest(dir: &std::path::Path, name: &str, multi_instance: bool) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("manifest.json"),
        format!(
            r#"{{"name":"{}","entryPoint":"index.js","multiInstanceSpawning":{}}}"#,
            name, multi_instance
        ),
    )
    .unwrap();
}

/// A module that registers one route and answers it immediately.
const ECHO_MODULE_JS: &str = r#"
const readline = require('readline');
const rl = readline.createInterface({ input: process.stdin });
rl.on('line', (line) => {
  if (!line.trim()) return;
  const msg = JSON.parse(line);
  if (msg.type === 'init') {
    process.stdout.write(JSON.stringify({
      type: 'register',
      routes: [{ method: 'GET', path: '/ping', handlerId: 'h1' }],
      commands: [],
    }) + '\n');
  } else if (msg.type === 'invoke') {
    process.stdout.write(JSON.stringify({
      type: 'response',
      id: msg.id,
      status: 200,
      payload: { pong: true },
    }) + '\n');
  }
});
"#;

/// A module that registers a route but never answers an `invoke` — used
/// to exercise the correlator's timeout path.
const SLOW_MODULE_JS: &str = r#"
const readline = require('readline');
const rl = readline.createInterface({ input: process.stdin });
rl.on('line', (line) => {
  if (!line.trim()) return;
  const msg = JSON.parse(line);
  if (msg.type === 'init') {
    process.stdout.write(JSON.stringify({
      type: 'register',
      routes: [{ method: 'GET', path: '/op', handlerId: 'slow' }],
      commands: [],
    }) + '\n');
  }
  // invoke is received and silently never answered.
});
"#;

fn write_module(modules_root: &std::path::Path, name: &str, source: &str) {
    let dir = modules_root.join(name);
    write_manifest(&dir, name, false);
    let entry = dir.join("index.js");
    let mut f = fs::File::create(&entry).unwrap();
    f.write_all(source.as_bytes()).unwrap();
    let mut perms = fs::metadata(&entry).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&entry, perms).unwrap();
}

async fn wait_for_route(plane: &ModulePlane, method: &str, path: &str) {
    for _ in 0..100 {
        if plane.registry.lookup_route(method, path).is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("route {} {} never registered", method, path);
}

/// Scenario 1 (spec.md §8): a fake module registers `GET /ping`
/// and replies `{pong: true}` within the request timeout.
#[tokio::test]
async fn register_then_call_over_http_round_trips() {
    let tmp = TempDir::new().unwrap();
    write_module(tmp.path(), "fake", ECHO_MODULE_JS);

    let config = base_config(tmp.path());
    let plane = ModulePlane::boot(&config).await.expect("boot must succeed");
    wait_for_route(&plane, "GET", "/fake/ping").await;

    let entry = plane.registry.lookup_route("GET", "/fake/ping").unwrap();
    assert_eq!(entry.handler_id, "h1");

    let reply = plane
        .invoke_http("fake", &entry.handler_id, None, json!({}), Duration::from_secs(5))
        .await
        .expect("module must reply before the timeout");
    assert_eq!(reply.payload, json!({"pong": true}));
}

/// Scenario 5 (spec.md §8): a handler that never replies times out
/// rather than hanging the caller.
#[tokio::test]
async fn unanswered_invoke_completes_with_timeout() {
    let tmp = TempDir::new().unwrap();
    write_module(tmp.path(), "slow", SLOW_MODULE_JS);

    let config = base_config(tmp.path());
    let plane = ModulePlane::boot(&config).await.expect("boot must succeed");
    wait_for_route(&plane, "GET", "/slow/op").await;

    let entry = plane.registry.lookup_route("GET", "/slow/op").unwrap();
    let result = plane
        .invoke_http("slow", &entry.handler_id, None, json!({}), Duration::from_millis(200))
        .await;
    assert!(matches!(result, Err(AppError::RequestTimeout)));
}

/// A module name with no loaded instance is reported as unavailable,
/// not a hang or a panic.
#[tokio::test]
async fn unknown_module_is_reported_unavailable() {
    let tmp = TempDir::new().unwrap();
    let config = base_config(tmp.path());
    let plane = ModulePlane::boot(&config).await.expect("boot must succeed");

    let result = plane
        .invoke_http("nonexistent", "h1", None, json!({}), Duration::from_secs(1))
        .await;
    assert!(matches!(result, Err(AppError::ModuleUnavailable { .. })));
}

/// Scenario 6 (spec.md §8): a circular dependency between two manifests
/// is a fatal boot error, and no routes are installed.
#[tokio::test]
async fn circular_dependency_aborts_boot() {
    let tmp = TempDir::new().unwrap();
    write_manifest(&tmp.path().join("a"), "a", true);
    fs::write(
        tmp.path().join("a").join("manifest.json"),
        r#"{"name":"a","dependencies":["b"]}"#,
    )
    .unwrap();
    write_manifest(&tmp.path().join("b"), "b", true);
    fs::write(
        tmp.path().join("b").join("manifest.json"),
        r#"{"name":"b","dependencies":["a"]}"#,
    )
    .unwrap();

    let config = base_config(tmp.path());
    let result = ModulePlane::boot(&config).await;
    assert!(matches!(result, Err(AppError::BootFatal(_))));
}
