// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify Web API client for a linked user's listening history.
//!
//! Uses the Authorization Code flow; tokens are stored per Strava athlete.

use crate::config::Config;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{PlayedTrack, Provider, ProviderTokens};
use crate::services::http::{check_response_json, transport_error};
use crate::services::tokens::{
    RefreshLocks, RefreshedTokens, TokenCache, TokenManager, TokenRefresher,
};
use crate::time_utils::format_utc_rfc3339;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Scopes requested from Spotify.
pub const SPOTIFY_SCOPES: &str = "user-read-private user-read-email user-read-recently-played";

/// Largest page Spotify serves for recently-played.
pub const MAX_HISTORY_LIMIT: u32 = 50;

/// Spotify API client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    base_url: String,
    accounts_url: String,
    client_id: String,
    client_secret: String,
}

impl SpotifyClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.spotify_api_url.clone(),
            accounts_url: config.spotify_accounts_url.clone(),
            client_id: config.spotify_client_id.clone(),
            client_secret: config.spotify_client_secret.clone(),
        }
    }

    /// URL of the Spotify consent screen.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.accounts_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(SPOTIFY_SCOPES),
            urlencoding::encode(state),
        )
    }

    /// HTTP Basic credentials for the token endpoint.
    fn basic_auth(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", BASE64.encode(credentials.as_bytes()))
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SpotifyTokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_url))
            .header(reqwest::header::AUTHORIZATION, self.basic_auth())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| transport_error(Provider::Spotify, "Token exchange failed", e))?;

        check_response_json(Provider::Spotify, response).await
    }

    /// Get the profile of the token's owner.
    pub async fn get_current_user(&self, access_token: &str) -> Result<SpotifyUser, AppError> {
        let response = self
            .http
            .get(format!("{}/me", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_error(Provider::Spotify, "Profile request failed", e))?;

        check_response_json(Provider::Spotify, response).await
    }

    /// Tracks played after `after`, newest first.
    pub async fn get_recently_played(
        &self,
        access_token: &str,
        after: DateTime<Utc>,
        limit: u32,
    ) -> Result<RecentlyPlayed, AppError> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let response = self
            .http
            .get(format!("{}/me/player/recently-played", self.base_url))
            .bearer_auth(access_token)
            .query(&[
                ("after", after.timestamp_millis().to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(Provider::Spotify, "Recently-played request failed", e))?;

        check_response_json(Provider::Spotify, response).await
    }
}

impl TokenRefresher for SpotifyClient {
    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshedTokens, AppError> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_url))
            .header(reqwest::header::AUTHORIZATION, self.basic_auth())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| transport_error(Provider::Spotify, "Token refresh request failed", e))?;

        let refreshed: SpotifyTokenResponse =
            check_response_json(Provider::Spotify, response).await?;
        Ok(RefreshedTokens {
            expires_at: refreshed.expires_at(Utc::now()),
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token,
        })
    }
}

/// Token endpoint response (code exchange and refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    /// Absent on refresh when Spotify keeps the old refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

impl SpotifyTokenResponse {
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + Duration::seconds(self.expires_in)
    }
}

/// Spotify user profile (`GET /me`).
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
}

/// Recently-played page, newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentlyPlayed {
    pub items: Vec<PlayedTrack>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SpotifyService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

/// High-level Spotify service keyed by the linking Strava athlete.
#[derive(Clone)]
pub struct SpotifyService {
    client: SpotifyClient,
    db: FirestoreDb,
    tokens: TokenManager,
}

impl SpotifyService {
    pub fn new(
        config: &Config,
        db: FirestoreDb,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Self {
        Self {
            client: SpotifyClient::new(config),
            tokens: TokenManager::new(Provider::Spotify, db.clone(), token_cache, refresh_locks),
            db,
        }
    }

    pub fn client(&self) -> &SpotifyClient {
        &self.client
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Exchange the code, look up the Spotify profile, and link it to the athlete.
    pub async fn handle_oauth_callback(
        &self,
        athlete_id: u64,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SpotifyUser, AppError> {
        let issued_at = Utc::now();
        let token_response = self.client.exchange_code(code, redirect_uri).await?;
        let refresh_token = token_response.refresh_token.clone().ok_or_else(|| {
            AppError::SpotifyApi("Token exchange returned no refresh token".to_string())
        })?;

        let spotify_user = self
            .client
            .get_current_user(&token_response.access_token)
            .await?;

        self.db
            .link_spotify_user(athlete_id, &spotify_user.id)
            .await?;

        let tokens = ProviderTokens {
            access_token: token_response.access_token.clone(),
            refresh_token,
            expires_at: format_utc_rfc3339(token_response.expires_at(issued_at)),
            scopes: token_response
                .scope
                .as_deref()
                .unwrap_or(SPOTIFY_SCOPES)
                .split_whitespace()
                .map(String::from)
                .collect(),
        };
        self.tokens.store(athlete_id, &tokens).await?;

        tracing::info!(
            athlete_id,
            spotify_user_id = %spotify_user.id,
            "Spotify account linked"
        );
        Ok(spotify_user)
    }

    /// Listening history after `after`, newest first.
    pub async fn get_play_history(
        &self,
        athlete_id: u64,
        after: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<PlayedTrack>, AppError> {
        let access_token = self
            .tokens
            .get_valid_access_token(&self.client, athlete_id)
            .await?;
        let page = self
            .client
            .get_recently_played(&access_token, after, limit)
            .await?;
        Ok(page.items)
    }

    /// Forget the athlete's Spotify tokens.
    pub async fn disconnect(&self, athlete_id: u64) -> Result<(), AppError> {
        self.tokens.revoke(athlete_id).await?;
        Ok(())
    }
}
