// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    extract::{Form, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use conquest_tracker::config::Config;
use conquest_tracker::db::{CyclistStore, FirestoreDb, MemoryDb, Store};
use conquest_tracker::models::{CredentialUpdate, CyclistCredential};
use conquest_tracker::routes::create_router;
use conquest_tracker::services::PassCatalog;
use conquest_tracker::AppState;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Fake Strava ─────────────────────────────────────────────

/// Auth code the fake provider accepts.
#[allow(dead_code)]
pub const GOOD_CODE: &str = "good-code";

/// Athlete ID returned on code exchange.
#[allow(dead_code)]
pub const FAKE_ATHLETE_ID: u64 = 987_654;

/// In-process stand-in for the Strava OAuth and activities endpoints.
///
/// Every endpoint counts its calls so tests can assert on network traffic.
pub struct FakeStrava {
    pub exchange_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub activity_calls: AtomicUsize,
    pub deauthorize_calls: AtomicUsize,
    /// Status returned by the activities endpoint
    pub activities_status: AtomicU16,
    /// Status returned by refresh grants (non-200 answers `invalid_grant`)
    pub refresh_status: AtomicU16,
    pub deauthorize_status: AtomicU16,
    pub activities: Mutex<Vec<Value>>,
    pub last_after: Mutex<Option<i64>>,
    pub last_bearer: Mutex<Option<String>>,
}

#[allow(dead_code)]
impl FakeStrava {
    fn new() -> Self {
        Self {
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            activity_calls: AtomicUsize::new(0),
            deauthorize_calls: AtomicUsize::new(0),
            activities_status: AtomicU16::new(200),
            refresh_status: AtomicU16::new(200),
            deauthorize_status: AtomicU16::new(200),
            activities: Mutex::new(Vec::new()),
            last_after: Mutex::new(None),
            last_bearer: Mutex::new(None),
        }
    }

    pub fn set_activities(&self, activities: Vec<Value>) {
        *self.activities.lock().unwrap() = activities;
    }

    pub fn activity_calls(&self) -> usize {
        self.activity_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn deauthorize_calls(&self) -> usize {
        self.deauthorize_calls.load(Ordering::SeqCst)
    }

    pub fn last_bearer(&self) -> Option<String> {
        self.last_bearer.lock().unwrap().clone()
    }

    pub fn last_after(&self) -> Option<i64> {
        *self.last_after.lock().unwrap()
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

async fn fake_token(
    State(fake): State<Arc<FakeStrava>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let expires_at = chrono::Utc::now().timestamp() + 6 * 3600;

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => {
            fake.exchange_calls.fetch_add(1, Ordering::SeqCst);
            if form.get("code").map(String::as_str) != Some(GOOD_CODE) {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"message": "Bad Request", "errors": [{"code": "invalid"}]})),
                )
                    .into_response();
            }
            Json(json!({
                "token_type": "Bearer",
                "access_token": "exchanged-access",
                "refresh_token": "exchanged-refresh",
                "expires_at": expires_at,
                "athlete": {"id": FAKE_ATHLETE_ID, "firstname": "Marco", "lastname": "P"}
            }))
            .into_response()
        }
        Some("refresh_token") => {
            let n = fake.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let status = fake.refresh_status.load(Ordering::SeqCst);
            if status != 200 {
                return (
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST),
                    Json(json!({"error": "invalid_grant"})),
                )
                    .into_response();
            }
            Json(json!({
                "token_type": "Bearer",
                "access_token": format!("refreshed-access-{}", n),
                "refresh_token": format!("refreshed-refresh-{}", n),
                "expires_at": expires_at
            }))
            .into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn fake_activities(
    State(fake): State<Arc<FakeStrava>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    fake.activity_calls.fetch_add(1, Ordering::SeqCst);
    *fake.last_bearer.lock().unwrap() = bearer(&headers);
    *fake.last_after.lock().unwrap() = query.get("after").and_then(|a| a.parse().ok());

    let status = fake.activities_status.load(Ordering::SeqCst);
    if status != 200 {
        return (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "upstream trouble",
        )
            .into_response();
    }

    let activities = fake.activities.lock().unwrap().clone();
    Json(activities).into_response()
}

async fn fake_deauthorize(State(fake): State<Arc<FakeStrava>>) -> StatusCode {
    fake.deauthorize_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::from_u16(fake.deauthorize_status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Start the fake provider on an ephemeral port; returns it and its base URL.
pub async fn spawn_fake_strava() -> (Arc<FakeStrava>, String) {
    let fake = Arc::new(FakeStrava::new());
    let app = Router::new()
        .route("/oauth/token", post(fake_token))
        .route("/oauth/deauthorize", post(fake_deauthorize))
        .route("/api/v3/athlete/activities", get(fake_activities))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (fake, format!("http://{}", addr))
}

// ─── Test App ────────────────────────────────────────────────

/// Everything a test needs to drive the app and inspect its side effects.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: Arc<MemoryDb>,
    pub strava: Arc<FakeStrava>,
}

/// The bundled pass catalog.
#[allow(dead_code)]
pub fn test_catalog() -> PassCatalog {
    PassCatalog::load_from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/data/passes.geojson"))
        .expect("bundled catalog should load")
}

/// Create a test app backed by the in-memory store and the fake provider.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    let (strava, base_url) = spawn_fake_strava().await;

    let mut config = Config::test_default();
    config.strava_api_url = format!("{}/api/v3", base_url);
    config.strava_oauth_url = format!("{}/oauth", base_url);
    config.http_timeout_secs = 5;

    let db = Arc::new(MemoryDb::new());
    let store: Arc<dyn Store> = db.clone();
    let state = Arc::new(AppState::build(config, store, test_catalog()).unwrap());

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        strava,
    }
}

/// Store a connected credential expiring `expires_in` seconds from now.
#[allow(dead_code)]
pub async fn connect_cyclist(db: &MemoryDb, cyclist_id: &str, expires_in: i64) {
    let credential = CyclistCredential::default().apply(CredentialUpdate::Connect {
        provider_athlete_id: FAKE_ATHLETE_ID.to_string(),
        access_token: "stored-access".to_string(),
        refresh_token: "stored-refresh".to_string(),
        expires_at: chrono::Utc::now().timestamp() + expires_in,
    });
    db.set_credential(cyclist_id, &credential).await.unwrap();
}

/// A Strava activity summary as the list endpoint returns it.
#[allow(dead_code)]
pub fn activity_json(id: u64, kind: &str, start: Option<(f64, f64)>) -> Value {
    let latlng = start.map(|(lat, lng)| json!([lat, lng])).unwrap_or(json!([]));
    json!({
        "id": id,
        "name": format!("Activity {}", id),
        "type": kind,
        "start_date": "2025-07-14T06:30:00Z",
        "start_latlng": latlng,
        "end_latlng": latlng,
    })
}

/// Create a test JWT token.
#[allow(dead_code)]
pub fn create_test_jwt(cyclist_id: &str, signing_key: &[u8]) -> String {
    conquest_tracker::middleware::auth::create_jwt(cyclist_id, signing_key).unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
