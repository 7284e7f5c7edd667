use apkdrop_gateway::{AppShell, Gateway, GatewayConfig, Route};
use apkdrop_inventory::Order;
use apkdrop_storage::backend::{BoxAsyncRead, Fault, LocalBackend, MockBackend, PathStream};
use apkdrop_storage::error::Result;
use apkdrop_storage::{FileInfo, StorageBackend};
use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use rstest::rstest;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

const SHELL_HTML: &[u8] = b"<!doctype html><div id=\"root\"></div><script src=\"/assets/app.js\"></script>";

fn shell() -> AppShell {
    AppShell::new(Arc::new(MockBackend::with_files([
        ("index.html", SHELL_HTML.to_vec()),
        ("assets/app.js", b"render()".to_vec()),
    ])))
}

fn router(packages: MockBackend) -> Router {
    Gateway::new(GatewayConfig::default(), Arc::new(packages), shell()).unwrap().router()
}

fn scenario() -> MockBackend {
    MockBackend::with_files([
        ("Game_Pro.apk", vec![7u8; 3_145_728]),
        ("tool-kit.apk", vec![9u8; 512_000]),
        ("readme.txt", b"not a package".to_vec()),
    ])
}

async fn send(router: &Router, method: Method, uri: &str) -> Response {
    let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
    router.clone().oneshot(request).await.unwrap()
}

async fn get(router: &Router, uri: &str) -> Response {
    send(router, Method::GET, uri).await
}

async fn body(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body(response).await).unwrap()
}

#[tokio::test]
async fn test_listing_scenario() {
    let response = get(&router(scenario()), "/api/apks").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(
        json(response).await,
        serde_json::json!([
            {"id": 1, "name": "Game Pro", "filename": "Game_Pro.apk", "size": "3.00 MB", "downloadUrl": "/apks/Game_Pro.apk"},
            {"id": 2, "name": "tool kit", "filename": "tool-kit.apk", "size": "0.49 MB", "downloadUrl": "/apks/tool-kit.apk"},
        ])
    );
}

#[tokio::test]
async fn test_listing_empty() {
    let response = get(&router(MockBackend::default()), "/api/apks").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_listing_missing_directory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("public").join("apks");
    let packages = Arc::new(LocalBackend::new("packages", &root).unwrap());
    let router = Gateway::new(GatewayConfig::default(), packages, shell()).unwrap().router();

    let response = get(&router, "/api/apks").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await, serde_json::json!([]));
    assert!(root.is_dir());
}

#[tokio::test]
async fn test_listing_failure() {
    let response = get(&router(MockBackend::default().with_fault(Fault::List)), "/api/apks").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json(response).await,
        serde_json::json!({"error": "Failed to list packages", "details": "permission denied: ."})
    );
}

#[tokio::test]
async fn test_listing_metadata_failure_is_not_partial() {
    let packages = scenario().with_fault(Fault::Stat("tool-kit.apk".into()));
    let response = get(&router(packages), "/api/apks").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let value = json(response).await;
    assert_eq!(value["error"], "Failed to list packages");
    assert_eq!(value["details"], "permission denied: tool-kit.apk");
}

#[tokio::test]
async fn test_listing_reflects_directory_changes() {
    let packages = Arc::new(MockBackend::default());
    let router = Gateway::new(GatewayConfig::default(), packages.clone(), shell()).unwrap().router();
    assert_eq!(json(get(&router, "/api/apks").await).await, serde_json::json!([]));

    packages.insert("Placed.apk", b"PK".to_vec()).await;
    let listing = json(get(&router, "/api/apks").await).await;
    let matching: Vec<_> = listing.as_array().unwrap().iter().filter(|e| e["filename"] == "Placed.apk").collect();
    assert_eq!(matching.len(), 1);
}

#[tokio::test]
async fn test_listing_sorted_by_name() {
    let packages = MockBackend::with_files([("b.apk", vec![1]), ("A.apk", vec![2]), ("a.apk", vec![3])]);
    let config = GatewayConfig {
        order: Order::Name,
        ..GatewayConfig::default()
    };
    let router = Gateway::new(config, Arc::new(packages), shell()).unwrap().router();
    let listing = json(get(&router, "/api/apks").await).await;
    let names: Vec<_> = listing.as_array().unwrap().iter().map(|e| e["filename"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["A.apk", "a.apk", "b.apk"]);
}

#[tokio::test]
async fn test_download_exact_bytes() {
    let router = router(scenario());
    let response = get(&router, "/apks/tool-kit.apk").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "512000");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/vnd.android.package-archive");
    assert!(response.headers().contains_key(header::LAST_MODIFIED));
    assert_eq!(body(response).await, vec![9u8; 512_000]);
}

#[tokio::test]
async fn test_download_follows_listing_url() {
    let router = router(scenario());
    let listing = json(get(&router, "/api/apks").await).await;
    let url = listing[0]["downloadUrl"].as_str().unwrap().to_string();
    let response = get(&router, &url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await.len(), 3_145_728);
}

#[tokio::test]
async fn test_download_percent_encoded_name() {
    let router = router(MockBackend::with_files([("with space.apk", b"spaced".to_vec())]));
    let response = get(&router, "/apks/with%20space.apk").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await, b"spaced");
}

#[tokio::test]
async fn test_download_head() {
    let response = send(&router(scenario()), Method::HEAD, "/apks/Game_Pro.apk").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "3145728");
    assert!(body(response).await.is_empty());
}

#[tokio::test]
async fn test_download_any_file_in_directory() {
    let response = get(&router(scenario()), "/apks/readme.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await, b"not a package");
}

#[tokio::test]
async fn test_download_removed_after_listing() {
    let packages = Arc::new(scenario());
    let router = Gateway::new(GatewayConfig::default(), packages.clone(), shell()).unwrap().router();
    let listing = json(get(&router, "/api/apks").await).await;
    assert_eq!(listing.as_array().unwrap().len(), 2);

    assert!(packages.remove("Game_Pro.apk").await);
    let response = get(&router, "/apks/Game_Pro.apk").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[rstest]
#[case("/apks/never-placed.apk")]
#[case("/apks/../Cargo.toml")]
#[case("/apks/%2e%2e/secret.apk")]
#[case("/apks/nested/inner.apk")]
#[case("/apks/a%2F..%2FGame_Pro.apk")]
#[case("/apks/")]
#[case("/apks")]
#[case("/apks/.env")]
#[case("/apks/.hidden.apk")]
#[tokio::test]
async fn test_download_not_found(#[case] uri: &str) {
    let packages = scenario();
    packages.insert("nested/inner.apk", b"hidden".to_vec()).await;
    packages.insert(".env", b"TOKEN=secret".to_vec()).await;
    packages.insert(".hidden.apk", b"private".to_vec()).await;
    let response = get(&router(packages), uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
}

/// Replaces `app.apk` with a staged file (the way rsync or a deploy
/// renames into place) whenever the file is about to be read.
struct ReplacedWhileServing {
    inner: LocalBackend,
    root: PathBuf,
}
impl ReplacedWhileServing {
    fn replace(&self) {
        let _ = std::fs::rename(self.root.join("staged.apk"), self.root.join("app.apk"));
    }
}

#[async_trait]
impl StorageBackend for ReplacedWhileServing {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream(&self) -> PathStream<'_> {
        self.inner.list_stream()
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.stat(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.replace();
        self.inner.read(path).await
    }

    async fn reader(&self, path: &Path) -> Result<BoxAsyncRead> {
        self.replace();
        self.inner.reader(path).await
    }

    async fn open(&self, path: &Path) -> Result<(FileInfo, BoxAsyncRead)> {
        self.replace();
        self.inner.open(path).await
    }
}

#[tokio::test]
async fn test_download_replaced_file_is_consistent() {
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(temp_dir.path().join("app.apk"), b"original app").unwrap();
    std::fs::write(temp_dir.path().join("staged.apk"), b"newer").unwrap();
    let packages = ReplacedWhileServing {
        inner: LocalBackend::new("packages", temp_dir.path()).unwrap(),
        root: temp_dir.path().to_path_buf(),
    };
    let router = Gateway::new(GatewayConfig::default(), Arc::new(packages), shell()).unwrap().router();

    let response = get(&router, "/apks/app.apk").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
    assert_eq!(body(response).await, b"newer");
}

#[tokio::test]
async fn test_download_storage_failure() {
    let packages = scenario().with_fault(Fault::Stat("Game_Pro.apk".into()));
    let response = get(&router(packages), "/apks/Game_Pro.apk").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[rstest]
#[case("/some/random/route")]
#[case("/catalog?search=game")]
#[case("/api/other")]
#[case("/api/apks/1")]
#[case("/apksfoo")]
#[case("/missing.css")]
#[tokio::test]
async fn test_unmatched_paths_serve_shell(#[case] uri: &str) {
    let router = router(scenario());
    let root = get(&router, "/").await;
    assert_eq!(root.status(), StatusCode::OK);
    assert_eq!(root.headers()[header::CONTENT_TYPE], "text/html");
    let root = body(root).await;
    assert_eq!(root, SHELL_HTML);

    let response = get(&router, uri).await;
    assert_eq!(response.status(), StatusCode::OK, "{uri}");
    assert_eq!(body(response).await, root, "{uri}");
}

#[tokio::test]
async fn test_shell_static_asset() {
    let response = get(&router(scenario()), "/assets/app.js").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE].to_str().unwrap().ends_with("/javascript"));
    assert_eq!(body(response).await, b"render()");
}

#[tokio::test]
async fn test_shell_head() {
    let response = send(&router(scenario()), Method::HEAD, "/anything").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], SHELL_HTML.len().to_string().as_str());
    assert!(body(response).await.is_empty());
}

#[tokio::test]
async fn test_shell_missing_entry_document() {
    let shell = AppShell::new(Arc::new(MockBackend::default()));
    let router = Gateway::new(GatewayConfig::default(), Arc::new(scenario()), shell).unwrap().router();
    assert_eq!(get(&router, "/").await.status(), StatusCode::INTERNAL_SERVER_ERROR);
    // The other routes don't depend on the shell.
    assert_eq!(get(&router, "/api/apks").await.status(), StatusCode::OK);
    assert_eq!(get(&router, "/apks/tool-kit.apk").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_embedded_shell() {
    let router = Gateway::new(GatewayConfig::default(), Arc::new(scenario()), AppShell::embedded()).unwrap().router();
    let response = get(&router, "/anywhere").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body(response).await).unwrap();
    assert!(html.contains("/api/apks"));
}

#[tokio::test]
async fn test_shell_never_shadows_other_routes() {
    // A shell that happens to contain files at the listing and download paths.
    let shell = AppShell::new(Arc::new(MockBackend::with_files([
        ("index.html", SHELL_HTML.to_vec()),
        ("api/apks", b"shadow".to_vec()),
        ("apks/Game_Pro.apk", b"shadow".to_vec()),
    ])));
    let gateway = Gateway::new(GatewayConfig::default(), Arc::new(scenario()), shell).unwrap();
    let router = gateway.router();

    assert_eq!(gateway.routes().resolve("/api/apks"), Route::Inventory);
    let listing = json(get(&router, "/api/apks").await).await;
    assert_eq!(listing.as_array().unwrap().len(), 2);

    assert_eq!(gateway.routes().resolve("/apks/Game_Pro.apk"), Route::Download);
    let response = get(&router, "/apks/Game_Pro.apk").await;
    assert_eq!(body(response).await.len(), 3_145_728);
}

#[tokio::test]
async fn test_custom_mount() {
    let config = GatewayConfig {
        mount: "/downloads".to_string(),
        ..GatewayConfig::default()
    };
    let router = Gateway::new(config, Arc::new(scenario()), shell()).unwrap().router();
    let listing = json(get(&router, "/api/apks").await).await;
    assert_eq!(listing[0]["downloadUrl"], "/downloads/Game_Pro.apk");
    assert_eq!(get(&router, "/downloads/Game_Pro.apk").await.status(), StatusCode::OK);
    // The old mount is just another client-side route now.
    assert_eq!(body(get(&router, "/apks/Game_Pro.apk").await).await, SHELL_HTML);
}

#[rstest]
#[case(Method::POST, "/api/apks")]
#[case(Method::DELETE, "/apks/Game_Pro.apk")]
#[case(Method::PUT, "/")]
#[case(Method::POST, "/some/random/route")]
#[tokio::test]
async fn test_read_only(#[case] method: Method, #[case] uri: &str) {
    let response = send(&router(scenario()), method, uri).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{uri}");
}

#[tokio::test]
async fn test_serve_over_socket() {
    let packages = MockBackend::with_files([("app.apk", b"PK".to_vec())]);
    let gateway = Gateway::new(GatewayConfig::default(), Arc::new(packages), shell()).unwrap();
    let listener = Gateway::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let address = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(gateway.serve(listener, async move {
        let _ = stopped.await;
    }));

    let mut stream = tokio::net::TcpStream::connect(address).await.unwrap();
    stream
        .write_all(b"GET /api/apks HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();
    assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
    assert!(raw.contains(r#""downloadUrl":"/apks/app.apk""#), "{raw}");

    stop.send(()).unwrap();
    assert!(server.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_bind_address_in_use() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let err = Gateway::bind(taken.local_addr().unwrap()).await.unwrap_err();
    assert!(matches!(&*err, apkdrop_gateway::error::ErrorKind::Bind(_)));
    assert!(err.is_retryable());
}
