// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Strava athlete ID (also used as document ID)
    pub strava_athlete_id: u64,
    /// First name
    pub firstname: String,
    /// Last name
    pub lastname: String,
    /// Spotify user ID, once the Spotify account is linked
    #[serde(default)]
    pub spotify_user_id: Option<String>,
    /// When user first connected
    pub created_at: String,
    /// Last activity timestamp
    pub last_active: String,
}

/// OAuth provider whose credentials we hold for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Strava,
    Spotify,
}

impl Provider {
    /// Firestore collection holding this provider's tokens.
    pub fn collection(self) -> &'static str {
        match self {
            Provider::Strava => crate::db::collections::STRAVA_TOKENS,
            Provider::Spotify => crate::db::collections::SPOTIFY_TOKENS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Strava => "strava",
            Provider::Spotify => "spotify",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's OAuth tokens for one provider, keyed by Strava athlete ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires (RFC 3339)
    pub expires_at: String,
    /// Granted OAuth scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}
