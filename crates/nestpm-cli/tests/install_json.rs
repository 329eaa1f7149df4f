//! Integration tests for `nestpm install`.
//!
//! These tests use a mock npm registry to avoid network calls.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::net::SocketAddr;
use std::process::Command;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::Duration;
use tar::Builder;
use tempfile::TempDir;

/// Global port counter for unique mock server ports.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(19900);

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "nestpm-cli", "--bin", "nestpm", "--"]);
    cmd
}

/// Packages served by the mock registry: (name, version, dependencies).
const PACKAGES: &[(&str, &str, &[(&str, &str)])] = &[
    ("left-pad", "1.0.0", &[]),
    ("left-pad", "1.1.0", &[("util", "^1.0.0")]),
    ("util", "1.0.0", &[]),
    ("util", "1.3.2", &[]),
    ("util", "2.0.0", &[]),
];

fn dependencies_json(deps: &[(&str, &str)]) -> serde_json::Value {
    deps.iter()
        .map(|(n, r)| ((*n).to_string(), serde_json::json!(r)))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

/// Create a test tarball with a package.json.
fn create_test_tarball(name: &str, version: &str, deps: &[(&str, &str)]) -> Vec<u8> {
    let pkg_json = serde_json::json!({
        "name": name,
        "version": version,
        "main": "index.js",
        "dependencies": dependencies_json(deps),
    })
    .to_string();
    let index_js = b"module.exports = 42;";

    let mut tar_bytes = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_bytes);

        let mut header = tar::Header::new_gnu();
        header.set_path("package/package.json").unwrap();
        header.set_size(pkg_json.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, pkg_json.as_bytes()).unwrap();

        let mut header = tar::Header::new_gnu();
        header.set_path("package/index.js").unwrap();
        header.set_size(index_js.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &index_js[..]).unwrap();

        builder.finish().unwrap();
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

/// Create the registry document for a package.
fn create_descriptor(name: &str, base_url: &str) -> Option<serde_json::Value> {
    let mut versions = serde_json::Map::new();
    let mut latest = None;
    for (pkg, version, deps) in PACKAGES.iter().filter(|(pkg, _, _)| *pkg == name) {
        versions.insert(
            (*version).to_string(),
            serde_json::json!({
                "name": pkg,
                "version": version,
                "dependencies": dependencies_json(deps),
                "dist": { "tarball": format!("{base_url}/{pkg}/-/{pkg}-{version}.tgz") },
            }),
        );
        latest = Some(*version);
    }

    latest.map(|latest| {
        serde_json::json!({
            "name": name,
            "dist-tags": { "latest": latest },
            "versions": versions,
        })
    })
}

fn mock_registry_router(base_url: String) -> Router {
    Router::new()
        .route("/:name", get(handle_descriptor))
        .route("/:name/-/:tarball", get(handle_tarball))
        .with_state(base_url)
}

async fn handle_descriptor(Path(name): Path<String>, State(base_url): State<String>) -> Response {
    match create_descriptor(&name, &base_url) {
        Some(doc) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            doc.to_string(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

async fn handle_tarball(Path((name, tarball)): Path<(String, String)>) -> Response {
    let expected_prefix = format!("{name}-");
    let version = tarball
        .strip_prefix(&expected_prefix)
        .and_then(|s| s.strip_suffix(".tgz"))
        .unwrap_or("");

    match PACKAGES
        .iter()
        .find(|(pkg, v, _)| *pkg == name && *v == version)
    {
        Some((pkg, v, deps)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/gzip")],
            Body::from(create_test_tarball(pkg, v, deps)),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// Start the mock registry server in a background thread.
/// Returns the base URL.
fn start_mock_registry() -> String {
    let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let base_url = format!("http://127.0.0.1:{port}");
    let base_url_clone = base_url.clone();

    thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let app = mock_registry_router(base_url_clone);
            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    // Give the server time to start
    thread::sleep(Duration::from_millis(100));

    base_url
}

fn install(registry: &str, cache: &TempDir, out: &TempDir, specs: &[&str]) -> std::process::Output {
    cargo_bin()
        .arg("install")
        .args(specs)
        .arg("--registry")
        .arg(registry)
        .arg("--cache-dir")
        .arg(cache.path())
        .arg("--out-dir")
        .arg(out.path())
        .arg("--no-local-cache")
        .arg("--json")
        .output()
        .expect("Failed to run nestpm install")
}

#[test]
fn test_install_json_nested_dependency() {
    let registry = start_mock_registry();
    let cache = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let output = install(&registry, &cache, &out, &["left-pad"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "install failed: {stdout}\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: serde_json::Value = serde_json::from_str(&stdout).expect("Invalid JSON output");
    assert_eq!(json["ok"], true);
    let installed = json["installed"].as_array().unwrap();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0]["name"], "left-pad");
    assert_eq!(installed[0]["version"], "1.1.0");
    assert_eq!(installed[0]["installed"], 2);

    let util = out.path().join("left-pad/node_modules/util/package.json");
    let util: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(util).unwrap()).unwrap();
    assert_eq!(util["version"], "1.3.2");
    assert!(out.path().join("left-pad/index.js").is_file());
}

#[test]
fn test_install_json_exact_and_range_specs() {
    let registry = start_mock_registry();
    let cache = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let output = install(&registry, &cache, &out, &["left-pad@1.0.0", "util@~1.3.0"]);
    assert!(output.status.success());

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Invalid JSON output");
    let installed = json["installed"].as_array().unwrap();
    assert_eq!(installed[0]["version"], "1.0.0");
    assert_eq!(installed[1]["name"], "util");
    assert_eq!(installed[1]["version"], "1.3.2");
    assert!(!out.path().join("left-pad/node_modules").exists());
}

#[test]
fn test_install_json_unknown_package() {
    let registry = start_mock_registry();
    let cache = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let output = install(&registry, &cache, &out, &["does-not-exist"]);
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Invalid JSON output");
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "PKG_NOT_FOUND");
    assert_eq!(json["error"]["spec"], "does-not-exist");
}

#[test]
fn test_install_json_no_matching_version() {
    let registry = start_mock_registry();
    let cache = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let output = install(&registry, &cache, &out, &["util@^3.0.0"]);
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Invalid JSON output");
    assert_eq!(json["error"]["code"], "PKG_NO_MATCHING_VERSION");
}

#[test]
fn test_install_populates_cache() {
    let registry = start_mock_registry();
    let project = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    std::fs::write(
        project.path().join("nestpm.json"),
        serde_json::json!({ "registry": registry, "cacheDir": "blobs" }).to_string(),
    )
    .unwrap();

    let output = cargo_bin()
        .arg("--cwd")
        .arg(project.path())
        .args(["install", "util@1.0.0", "--no-local-cache", "--json", "--out-dir"])
        .arg(out.path())
        .output()
        .expect("Failed to run nestpm install");
    assert!(output.status.success());

    // Descriptor and tarball for util@1.0.0.
    let output = cargo_bin()
        .arg("--cwd")
        .arg(project.path())
        .args(["cache", "path", "--json"])
        .output()
        .expect("Failed to run nestpm cache path");
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["entries"], 2);
    assert_eq!(
        json["path"].as_str().unwrap(),
        project.path().join("blobs").to_str().unwrap()
    );

    let output = cargo_bin()
        .arg("--cwd")
        .arg(project.path())
        .args(["cache", "clean", "--json"])
        .output()
        .expect("Failed to run nestpm cache clean");
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["removed"], 2);
    assert_eq!(std::fs::read_dir(project.path().join("blobs")).unwrap().count(), 0);
}
