// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Theme Song API Server
//!
//! Receives Strava activity webhooks and annotates each activity with the
//! Spotify track that was playing at the athlete's peak heart rate.

use std::sync::Arc;
use theme_song::{
    config::Config,
    db::FirestoreDb,
    services::{RefreshLocks, SpotifyService, StravaService, TokenCache},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Theme Song API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    // Strava and Spotify tokens are keyed by the same athlete ID, so each
    // provider gets its own cache and lock table.
    let strava_cache: TokenCache = Arc::new(dashmap::DashMap::new());
    let strava_locks: RefreshLocks = Arc::new(dashmap::DashMap::new());
    let spotify_cache: TokenCache = Arc::new(dashmap::DashMap::new());
    let spotify_locks: RefreshLocks = Arc::new(dashmap::DashMap::new());
    tracing::info!("Token caches initialized");

    let strava_service = StravaService::new(&config, db.clone(), strava_cache, strava_locks);
    let spotify_service = SpotifyService::new(&config, db.clone(), spotify_cache, spotify_locks);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        strava_service,
        spotify_service,
    });

    // Build router
    let app = theme_song::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("theme_song=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
