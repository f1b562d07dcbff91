// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Theme Song: tag Strava activities with the song playing at peak heart rate.
//!
//! This crate provides the backend API that receives Strava activity
//! webhooks, lines up the peak of the heart-rate stream with the athlete's
//! Spotify listening history, and writes the match into the activity
//! description.

pub mod config;
pub mod correlation;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{SpotifyService, StravaService, ThemeSongProcessor};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub strava_service: StravaService,
    pub spotify_service: SpotifyService,
}

impl AppState {
    /// Processor wired to this state's provider services.
    pub fn theme_song_processor(&self) -> ThemeSongProcessor {
        ThemeSongProcessor::new(self.strava_service.clone(), self.spotify_service.clone())
    }
}
