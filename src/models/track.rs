// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify track and play-history models.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Public URL prefix for a Spotify track.
const SPOTIFY_TRACK_URL: &str = "https://open.spotify.com/track";

/// A Spotify track as returned inside play history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub duration_ms: u64,
    /// Web API endpoint for full track details
    pub href: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub external_urls: Option<ExternalUrls>,
}

impl Track {
    /// Link a listener can open, preferring the URL Spotify hands us.
    pub fn link(&self) -> String {
        self.external_urls
            .as_ref()
            .and_then(|u| u.spotify.clone())
            .unwrap_or_else(|| format!("{}/{}", SPOTIFY_TRACK_URL, self.id))
    }

    pub fn duration(&self) -> TimeDelta {
        TimeDelta::milliseconds(i64::try_from(self.duration_ms).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

/// One entry of a user's recently-played history.
///
/// `played_at` is when playback *ended*.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayedTrack {
    pub track: Track,
    pub played_at: DateTime<Utc>,
}

impl PlayedTrack {
    /// The closed interval `[played_at - duration, played_at]`.
    pub fn play_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = self.played_at;
        let start = end
            .checked_sub_signed(self.track.duration())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        (start, end)
    }
}
