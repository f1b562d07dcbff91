// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub(crate) mod http;
pub mod oauth_state;
pub mod spotify;
pub mod strava;
pub mod theme_song;
pub mod tokens;

pub use spotify::{SpotifyClient, SpotifyService, SpotifyUser};
pub use strava::{OAuthResult, StravaClient, StravaService};
pub use theme_song::{ProcessOutcome, ThemeSongProcessor};
pub use tokens::{CachedToken, RefreshLocks, TokenCache, TokenManager};
