// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use theme_song::config::Config;
use theme_song::db::FirestoreDb;
use theme_song::routes::create_router;
use theme_song::services::{SpotifyService, StravaService};
use theme_song::AppState;

/// Athlete used by offline tests.
#[allow(dead_code)]
pub const ATHLETE_ID: u64 = 12345;

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

/// Build services and state around `config` and `db`.
#[allow(dead_code)]
pub fn test_state(config: Config, db: FirestoreDb) -> Arc<AppState> {
    let strava_service = StravaService::new(
        &config,
        db.clone(),
        Arc::new(dashmap::DashMap::new()),
        Arc::new(dashmap::DashMap::new()),
    );
    let spotify_service = SpotifyService::new(
        &config,
        db.clone(),
        Arc::new(dashmap::DashMap::new()),
        Arc::new(dashmap::DashMap::new()),
    );

    Arc::new(AppState {
        config,
        db,
        strava_service,
        spotify_service,
    })
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    let state = test_state(Config::test_default(), FirestoreDb::new_mock());
    (create_router(state.clone()), state)
}

/// Put fresh access tokens for both providers into the in-memory caches,
/// so handlers never need Firestore.
#[allow(dead_code)]
pub fn seed_tokens(state: &AppState, athlete_id: u64) {
    let expires_at = Utc::now() + Duration::hours(1);
    state
        .strava_service
        .tokens()
        .cache_token(athlete_id, "strava-access".to_string(), expires_at);
    state
        .spotify_service
        .tokens()
        .cache_token(athlete_id, "spotify-access".to_string(), expires_at);
}

// ─── Fake Strava/Spotify ─────────────────────────────────────

/// Mutable world served by [`FakeProviders`].
#[allow(dead_code)]
pub struct FakeWorld {
    pub start_date: String,
    pub description: Mutex<Option<String>>,
    pub time: Vec<f64>,
    /// `None` means the activity was recorded without a heart-rate monitor.
    pub heartrate: Option<Vec<f64>>,
    pub recently_played: Value,
    /// Query string of the last recently-played request.
    pub last_history_query: Mutex<HashMap<String, String>>,
    pub description_updates: AtomicUsize,
    /// Whether `GET /athlete` accepts our token.
    pub strava_token_active: AtomicBool,
    /// Count of refresh_token grants served, per provider.
    pub strava_refreshes: AtomicUsize,
    pub spotify_refreshes: AtomicUsize,
    pub deauthorizations: AtomicUsize,
}

impl FakeWorld {
    /// Activity at 2021-07-09T00:00:00Z peaking at +3 s, one 10 s track
    /// that finished at 00:00:05.
    #[allow(dead_code)]
    pub fn matching_song() -> Self {
        Self {
            start_date: "2021-07-09T00:00:00Z".to_string(),
            description: Mutex::new(None),
            time: vec![1.0, 2.0, 3.0],
            heartrate: Some(vec![1.0, 2.0, 3.0]),
            recently_played: json!({
                "items": [{
                    "track": {
                        "id": "123",
                        "name": "test",
                        "duration_ms": 10000,
                        "href": "https://api.spotify.com/v1/tracks/123",
                        "artists": [{"name": "Tester"}],
                        "external_urls": {"spotify": "https://open.spotify.com/track/123"}
                    },
                    "played_at": "2021-07-09T00:00:05Z"
                }],
                "next": null
            }),
            last_history_query: Mutex::new(HashMap::new()),
            description_updates: AtomicUsize::new(0),
            strava_token_active: AtomicBool::new(true),
            strava_refreshes: AtomicUsize::new(0),
            spotify_refreshes: AtomicUsize::new(0),
            deauthorizations: AtomicUsize::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn updates(&self) -> usize {
        self.description_updates.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn description(&self) -> Option<String> {
        self.description.lock().unwrap().clone()
    }
}

/// Throwaway HTTP server standing in for both provider APIs.
#[allow(dead_code)]
pub struct FakeProviders {
    pub addr: SocketAddr,
    pub world: Arc<FakeWorld>,
}

impl FakeProviders {
    #[allow(dead_code)]
    pub async fn start(world: FakeWorld) -> Self {
        let world = Arc::new(world);
        let app = Router::new()
            .route(
                "/api/v3/activities/{id}",
                get(get_activity).put(update_activity),
            )
            .route("/api/v3/activities/{id}/streams", get(get_streams))
            .route("/api/v3/athlete", get(get_athlete))
            .route("/oauth/token", post(strava_token))
            .route("/oauth/deauthorize", post(strava_deauthorize))
            .route("/v1/me", get(spotify_me))
            .route("/v1/me/player/recently-played", get(recently_played))
            .route("/api/token", post(spotify_token))
            .with_state(world.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, world }
    }

    /// Test config pointing both providers at this server.
    #[allow(dead_code)]
    pub fn config(&self) -> Config {
        Config {
            strava_api_url: format!("http://{}/api/v3", self.addr),
            strava_oauth_url: format!("http://{}/oauth", self.addr),
            spotify_api_url: format!("http://{}/v1", self.addr),
            spotify_accounts_url: format!("http://{}", self.addr),
            ..Config::test_default()
        }
    }

    /// Offline app whose provider calls go to this server.
    #[allow(dead_code)]
    pub fn app(&self) -> (Router, Arc<AppState>) {
        let state = test_state(self.config(), FirestoreDb::new_mock());
        seed_tokens(&state, ATHLETE_ID);
        (create_router(state.clone()), state)
    }
}

fn activity_json(world: &FakeWorld, id: u64) -> Value {
    json!({
        "id": id,
        "name": "Morning Ride",
        "start_date": world.start_date,
        "description": world.description(),
    })
}

async fn get_activity(State(world): State<Arc<FakeWorld>>, Path(id): Path<u64>) -> Json<Value> {
    Json(activity_json(&world, id))
}

async fn update_activity(
    State(world): State<Arc<FakeWorld>>,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    *world.description.lock().unwrap() = body["description"].as_str().map(String::from);
    world.description_updates.fetch_add(1, Ordering::SeqCst);
    Json(activity_json(&world, id))
}

async fn get_streams(State(world): State<Arc<FakeWorld>>) -> Json<Value> {
    let mut streams = json!({
        "time": {"data": world.time, "series_type": "time"},
    });
    if let Some(hr) = &world.heartrate {
        streams["heartrate"] = json!({"data": hr, "series_type": "time"});
    }
    Json(streams)
}

async fn get_athlete(State(world): State<Arc<FakeWorld>>) -> Response {
    if world.strava_token_active.load(Ordering::SeqCst) {
        Json(json!({"id": ATHLETE_ID, "firstname": "Test", "lastname": "User"})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Authorization Error"})),
        )
            .into_response()
    }
}

async fn recently_played(
    State(world): State<Arc<FakeWorld>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    *world.last_history_query.lock().unwrap() = query;
    Json(world.recently_played.clone())
}

async fn strava_token(
    State(world): State<Arc<FakeWorld>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let expires_at = (Utc::now() + Duration::hours(6)).timestamp();
    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => Json(json!({
            "token_type": "Bearer",
            "access_token": format!("strava-access-{}", form["code"]),
            "refresh_token": "strava-refresh",
            "expires_at": expires_at,
            "expires_in": 21600,
            "athlete": {"id": ATHLETE_ID, "firstname": "Test", "lastname": "User"}
        }))
        .into_response(),
        Some("refresh_token") => {
            world.strava_refreshes.fetch_add(1, Ordering::SeqCst);
            Json(json!({
                "token_type": "Bearer",
                "access_token": "strava-access-refreshed",
                "refresh_token": "strava-refresh-2",
                "expires_at": expires_at,
                "expires_in": 21600
            }))
            .into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn strava_deauthorize(State(world): State<Arc<FakeWorld>>) -> Json<Value> {
    world.deauthorizations.fetch_add(1, Ordering::SeqCst);
    Json(json!({"access_token": "revoked"}))
}

async fn spotify_token(
    State(world): State<Arc<FakeWorld>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => Json(json!({
            "access_token": format!("spotify-access-{}", form["code"]),
            "token_type": "Bearer",
            "scope": "user-read-recently-played",
            "expires_in": 3600,
            "refresh_token": "spotify-refresh"
        }))
        .into_response(),
        // Spotify usually keeps the existing refresh token.
        Some("refresh_token") => {
            world.spotify_refreshes.fetch_add(1, Ordering::SeqCst);
            Json(json!({
                "access_token": "spotify-access-refreshed",
                "token_type": "Bearer",
                "scope": "user-read-recently-played",
                "expires_in": 3600
            }))
            .into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn spotify_me() -> Json<Value> {
    Json(json!({"id": "spotify-user-1", "display_name": "Test Listener"}))
}
