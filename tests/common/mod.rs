// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test helpers: an in-process mock voting API and fake devices.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use univote_client::config::Config;
use univote_client::error::{ClientError, Result};
use univote_client::services::{
    CaptureDevices, GeoPoint, Locator, MemoryTokenStore, PhotoCapture, PhotoUploader,
    StaticPlatform,
};
use univote_client::VotingClient;

/// A request seen by the mock backend.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Path with the `/api` prefix removed
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub json: Option<Value>,
    pub body: Vec<u8>,
}

#[derive(Clone)]
struct Stub {
    status: u16,
    body: Value,
    delay: Duration,
}

#[derive(Default)]
struct MockState {
    stubs: Mutex<HashMap<(Method, String), Stub>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Mock voting API listening on a random local port.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: std::net::SocketAddr,
    state: Arc<MockState>,
}

#[allow(dead_code)]
impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Mock backend address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock backend failed");
        });

        Self { addr, state }
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn upload_url(&self) -> String {
        format!("http://{}/upload", self.addr)
    }

    /// Respond to `method path` with `status` and `body` from now on.
    pub fn stub(&self, method: Method, path: &str, status: u16, body: Value) {
        self.stub_delayed(method, path, status, body, Duration::ZERO);
    }

    /// Like [`stub`](Self::stub), but the response is held back for `delay`.
    pub fn stub_delayed(
        &self,
        method: Method,
        path: &str,
        status: u16,
        body: Value,
        delay: Duration,
    ) {
        self.state.stubs.lock().unwrap().insert(
            (method, path.to_string()),
            Stub {
                status,
                body,
                delay,
            },
        );
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state.requests.lock().unwrap().clear();
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let path = uri
        .path()
        .strip_prefix("/api")
        .unwrap_or(uri.path())
        .to_string();

    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        json: serde_json::from_slice(&body).ok(),
        body: body.to_vec(),
    });

    let stub = state.stubs.lock().unwrap().get(&(method, path)).cloned();
    match stub {
        Some(stub) => {
            if !stub.delay.is_zero() {
                tokio::time::sleep(stub.delay).await;
            }
            (
                StatusCode::from_u16(stub.status).expect("valid stub status"),
                Json(stub.body),
            )
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "not stubbed" }))),
    }
}

// ─── Clients ────────────────────────────────────────────────────────────────

#[allow(dead_code)]
pub fn test_platform() -> StaticPlatform {
    StaticPlatform {
        brand: Some("Samsung".to_string()),
        model: Some("Galaxy S21".to_string()),
        os_name: Some("Android".to_string()),
        os_version: Some("14".to_string()),
        app_version: Some("1.0.0".to_string()),
        installation_id: Some("install-123".to_string()),
    }
}

#[allow(dead_code)]
pub const DEVICE_ID: &str = "Samsung Galaxy S21 (Android 14) - App v1.0.0 - ID: install-123";

/// Client pointed at `backend`, with an inspectable in-memory token store.
#[allow(dead_code)]
pub fn test_client(backend: &MockBackend) -> (VotingClient, MemoryTokenStore) {
    let mut config = Config::test_default();
    config.api_base_url = backend.api_url();
    config.upload_base_url = backend.upload_url();

    let store = MemoryTokenStore::new();
    let client = VotingClient::new(config, Arc::new(test_platform()), Arc::new(store.clone()))
        .expect("Failed to build client");
    (client, store)
}

/// Client that has already signed in with token `tok-1`.
#[allow(dead_code)]
pub async fn signed_in_client(backend: &MockBackend) -> (VotingClient, MemoryTokenStore) {
    backend.stub(
        Method::POST,
        "/auth/login",
        200,
        json!({ "token": "tok-1", "student": student_json() }),
    );
    let (client, store) = test_client(backend);
    client
        .auth
        .login("CSC/2021/001", "secret1")
        .await
        .expect("login should succeed");
    backend.clear_requests();
    (client, store)
}

// ─── Fixtures ───────────────────────────────────────────────────────────────

#[allow(dead_code)]
pub fn student_json() -> Value {
    json!({
        "id": "stu-1",
        "matric_no": "CSC/2021/001",
        "full_name": "Ada Obi",
        "email": "ada@student.example.edu",
        "department": "Computer Science",
        "college": "COPAS",
        "level": "400",
        "has_voted_sessions": [],
        "first_login": false
    })
}

#[allow(dead_code)]
pub fn session_detail_json(location: Option<Value>) -> Value {
    json!({
        "id": "sess-1",
        "title": "SRC Elections 2026",
        "description": "Student representative council",
        "start_time": "2026-10-16T08:00:00Z",
        "end_time": "2026-10-16T18:00:00Z",
        "status": "active",
        "categories": ["President", "Treasurer"],
        "location": location,
        "is_off_campus_allowed": false,
        "eligible": true,
        "has_voted": false,
        "candidates_by_position": {
            "President": [
                { "id": "cand-p1", "name": "Tunde Bello", "position": "President", "photo_url": "https://img.example/p1.jpg" },
                { "id": "cand-p2", "name": "Ngozi Eze", "position": "President", "photo_url": "https://img.example/p2.jpg" }
            ],
            "Treasurer": [
                { "id": "cand-t1", "name": "Kemi Ade", "position": "Treasurer", "photo_url": "https://img.example/t1.jpg" }
            ]
        }
    })
}

#[allow(dead_code)]
pub fn campus_geofence() -> Value {
    json!({ "latitude": 6.5244, "longitude": 3.3792, "radius": 200.0 })
}

#[allow(dead_code)]
pub fn sessions_json(has_voted: bool) -> Value {
    json!({
        "sessions": [{
            "_id": "sess-1",
            "title": "SRC Elections 2026",
            "description": "Student representative council",
            "start_time": "2026-10-16T08:00:00Z",
            "end_time": "2026-10-16T18:00:00Z",
            "status": "active",
            "is_off_campus_allowed": false,
            "has_voted": has_voted,
            "candidate_count": 3
        }]
    })
}

// ─── Fake devices ───────────────────────────────────────────────────────────

#[allow(dead_code)]
pub struct FakeCamera {
    pub uri: Option<String>,
    pub shots: AtomicUsize,
}

#[async_trait::async_trait]
impl PhotoCapture for FakeCamera {
    async fn capture(&self) -> Result<String> {
        let n = self.shots.fetch_add(1, Ordering::SeqCst);
        match &self.uri {
            Some(uri) => Ok(format!("{}?shot={}", uri, n)),
            None => Err(ClientError::Capture("camera unavailable".to_string())),
        }
    }
}

#[allow(dead_code)]
pub struct FakeUploader {
    pub uploads: AtomicUsize,
}

#[async_trait::async_trait]
impl PhotoUploader for FakeUploader {
    async fn upload(&self, _local_uri: &str) -> Result<String> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://res.cloudinary.com/test/image/upload/v1/face-{}.jpg", n))
    }
}

#[allow(dead_code)]
pub struct FakeLocator {
    pub point: GeoPoint,
    pub fixes: AtomicUsize,
}

#[async_trait::async_trait]
impl Locator for FakeLocator {
    async fn current_position(&self) -> Result<GeoPoint> {
        self.fixes.fetch_add(1, Ordering::SeqCst);
        Ok(self.point)
    }
}

/// Devices standing on campus (inside the test geofence).
#[allow(dead_code)]
pub fn devices_at(point: GeoPoint) -> (CaptureDevices, Arc<FakeLocator>) {
    let locator = Arc::new(FakeLocator {
        point,
        fixes: AtomicUsize::new(0),
    });
    let devices = CaptureDevices {
        camera: Arc::new(FakeCamera {
            uri: Some("file:///data/cache/Camera/face.jpg".to_string()),
            shots: AtomicUsize::new(0),
        }),
        uploader: Arc::new(FakeUploader {
            uploads: AtomicUsize::new(0),
        }),
        locator: locator.clone(),
    };
    (devices, locator)
}
