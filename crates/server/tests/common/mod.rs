//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! backed by the mock engine, enabling E2E testing without an FFmpeg
//! installation.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use stillfade_core::{
    testing::MockEngine, AssetsConfig, Config, EngineConfig, LoadOptions, ServerConfig, Session,
    SessionEvent,
};
use stillfade_server::api::WsBroadcaster;

/// Re-export fixtures for test convenience
pub use stillfade_core::testing::fixtures;

pub const JS_ASSET: &[u8] = b"console.log('core');";
pub const WASM_ASSET: &[u8] = b"\0asm\x01\0\0\0";

const BOUNDARY: &str = "stillfade-test-boundary";

/// Test fixture for E2E testing with a mock engine.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_upload() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture
///         .upload("photo.jpg", "image/jpeg", &fixtures::jpeg_bytes(1024))
///         .await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock engine - control loading, exec and the virtual file system
    pub engine: Arc<MockEngine>,
    pub session: Arc<Session>,
    pub ws_broadcaster: WsBroadcaster,
    /// Temporary directory holding the engine assets
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Parsed JSON body, `Null` for non-JSON bodies
    pub body: Value,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestFixture {
    /// Create a new test fixture with a ready engine.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let assets_dir = temp_dir.path().join("ffmpeg");
        std::fs::create_dir_all(&assets_dir).expect("Failed to create assets dir");

        if test_config.write_assets {
            std::fs::write(assets_dir.join("ffmpeg-core.js"), JS_ASSET)
                .expect("Failed to write js asset");
            std::fs::write(assets_dir.join("ffmpeg-core.wasm"), WASM_ASSET)
                .expect("Failed to write wasm asset");
        }
        // Present on disk but not an allowed asset.
        std::fs::write(assets_dir.join("other.js"), b"nope").expect("Failed to write stray file");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
                ui_dir: None,
                max_upload_bytes: 1024 * 1024,
            },
            engine: EngineConfig::default(),
            assets: AssetsConfig {
                dir: assets_dir,
                base_path: "/ffmpeg".to_string(),
            },
        };

        // Create mock engine
        let engine = Arc::new(MockEngine::new());
        if let Some(reason) = test_config.load_error {
            engine.set_load_error(reason).await;
        }

        let ws_broadcaster = WsBroadcaster::default();
        let broadcaster_for_callback = ws_broadcaster.clone();

        let session = Arc::new(
            Session::new(
                engine.clone(),
                LoadOptions::new(config.assets.core_url(), config.assets.wasm_url()),
            )
            .with_update_callback(Arc::new(move |event: &SessionEvent| {
                broadcaster_for_callback.session_event(event)
            })),
        );
        if test_config.initialize {
            session.initialize().await;
        }

        let state = Arc::new(stillfade_server::state::AppState::new(
            config,
            Arc::clone(&session),
            ws_broadcaster.clone(),
        ));

        let router = stillfade_server::api::create_router(state);

        Self {
            router,
            engine,
            session,
            ws_broadcaster,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(path), Body::empty())
            .await
    }

    /// Send a POST request with an empty body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("POST").uri(path), Body::empty())
            .await
    }

    /// Upload one file in the `file` multipart field.
    pub async fn upload(&self, file_name: &str, content_type: &str, data: &[u8]) -> TestResponse {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        self.post_multipart(body).await
    }

    /// Submit the upload form with no `file` field.
    pub async fn upload_nothing(&self) -> TestResponse {
        let body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{}--\r\n",
            BOUNDARY, BOUNDARY
        );
        self.post_multipart(body.into_bytes()).await
    }

    async fn post_multipart(&self, body: Vec<u8>) -> TestResponse {
        let builder = Request::builder()
            .method("POST")
            .uri("/api/v1/upload")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        self.send(builder, Body::from(body)).await
    }

    async fn send(&self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let request = builder.body(body).unwrap();
        send_request(self.router.clone(), request).await
    }
}

/// Drive one request through `router`.
pub async fn send_request(router: Router, request: Request<Body>) -> TestResponse {
    let response = router
        .oneshot(request)
        .await
        .expect("Failed to send request");

    let status = response.status();
    let headers = response.headers().clone();
    let body_bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect body")
        .to_bytes();

    let body: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        headers,
        body,
        bytes: body_bytes.to_vec(),
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Make the engine fail to load with this reason
    pub load_error: Option<String>,
    /// Run `Session::initialize` before returning the fixture
    pub initialize: bool,
    /// Write the engine assets into the asset directory
    pub write_assets: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            load_error: None,
            initialize: true,
            write_assets: true,
        }
    }
}

impl TestConfig {
    /// Create config whose engine fails to load.
    pub fn with_load_error(reason: &str) -> Self {
        Self {
            load_error: Some(reason.to_string()),
            ..Default::default()
        }
    }

    /// Create config whose engine is never initialized.
    pub fn uninitialized() -> Self {
        Self {
            initialize: false,
            ..Default::default()
        }
    }

    /// Create config without asset files on disk.
    pub fn without_assets() -> Self {
        Self {
            write_assets: false,
            ..Default::default()
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
