// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for fetching and updating activities.
//!
//! Handles:
//! - Activity and heart-rate stream fetching
//! - Activity description updates
//! - OAuth code exchange, token refresh and deauthorization
//! - Rate limit detection

use crate::config::Config;
use crate::correlation::HeartRateStream;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Provider, ProviderTokens, User};
use crate::services::http::{check_response, check_response_json, transport_error};
use crate::services::tokens::{
    RefreshLocks, RefreshedTokens, TokenCache, TokenManager, TokenRefresher,
};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scopes requested from Strava: read private activities, write descriptions.
pub const STRAVA_SCOPES: &str = "activity:read_all,activity:write";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.strava_api_url.clone(),
            oauth_url: config.strava_oauth_url.clone(),
            client_id: config.strava_client_id.clone(),
            client_secret: config.strava_client_secret.clone(),
        }
    }

    /// URL of the Strava consent screen.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&approval_prompt=force",
            self.oauth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(STRAVA_SCOPES),
            urlencoding::encode(state),
        )
    }

    /// Get a detailed activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);
        self.get_json(&url, access_token, &[]).await
    }

    /// Get the time and heart-rate streams of an activity.
    pub async fn get_heart_rate_stream(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<HeartRateStream, AppError> {
        let url = format!("{}/activities/{}/streams", self.base_url, activity_id);
        let streams: StravaStreamSet = self
            .get_json(
                &url,
                access_token,
                &[("keys", "time,heartrate"), ("key_by_type", "true")],
            )
            .await?;
        Ok(streams.into())
    }

    /// Update an activity's description.
    pub async fn update_activity_description(
        &self,
        access_token: &str,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);

        let body = serde_json::json!({
            "description": description
        });

        let response = self
            .http
            .put(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(Provider::Strava, "Activity update failed", e))?;

        check_response(Provider::Strava, response).await?;
        Ok(())
    }

    /// Exchange an authorization code for tokens and the athlete profile.
    pub async fn exchange_code(&self, code: &str) -> Result<StravaTokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| transport_error(Provider::Strava, "Token exchange failed", e))?;

        check_response_json(Provider::Strava, response).await
    }

    /// Deauthorize the application for a user.
    ///
    /// Invalidates all access and refresh tokens for the user.
    pub async fn deauthorize(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/deauthorize", self.oauth_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_error(Provider::Strava, "Deauthorization request failed", e))?;

        check_response(Provider::Strava, response).await?;
        tracing::info!("Strava deauthorization successful");
        Ok(())
    }

    /// Get authenticated athlete profile.
    pub async fn get_athlete(&self, access_token: &str) -> Result<StravaAthlete, AppError> {
        let url = format!("{}/athlete", self.base_url);
        self.get_json(&url, access_token, &[]).await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(Provider::Strava, "Request failed", e))?;

        check_response_json(Provider::Strava, response).await
    }
}

impl TokenRefresher for StravaClient {
    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshedTokens, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| transport_error(Provider::Strava, "Token refresh request failed", e))?;

        let refreshed: TokenRefreshResponse =
            check_response_json(Provider::Strava, response).await?;
        Ok(RefreshedTokens {
            expires_at: expiry_from_timestamp(refreshed.expires_at)?,
            access_token: refreshed.access_token,
            refresh_token: Some(refreshed.refresh_token),
        })
    }
}

/// Convert Strava's `expires_at` (Unix seconds) to a timestamp.
fn expiry_from_timestamp(expires_at: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp(expires_at, 0).ok_or_else(|| {
        AppError::StravaApi(format!("Token expires_at out of range: {}", expires_at))
    })
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct StravaTokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
}

/// The slice of a detailed Strava activity we need.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: u64,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Streams response with `key_by_type=true`.
///
/// Activities recorded without a heart-rate monitor have no `heartrate` key.
#[derive(Debug, Clone, Deserialize)]
struct StravaStreamSet {
    #[serde(default)]
    time: Option<StravaStream>,
    #[serde(default)]
    heartrate: Option<StravaStream>,
}

#[derive(Debug, Clone, Deserialize)]
struct StravaStream {
    data: Vec<f64>,
}

impl From<StravaStreamSet> for HeartRateStream {
    fn from(set: StravaStreamSet) -> Self {
        HeartRateStream {
            time: set.time.map(|s| s.data).unwrap_or_default(),
            heartrate: set.heartrate.map(|s| s.data).unwrap_or_default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

/// High-level Strava service that manages token lifecycle and API calls.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    db: FirestoreDb,
    tokens: TokenManager,
}

impl StravaService {
    /// Create a new Strava service with shared token cache.
    ///
    /// The `token_cache` and `refresh_locks` should be shared across all
    /// `StravaService` instances in the process.
    pub fn new(
        config: &Config,
        db: FirestoreDb,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Self {
        Self {
            client: StravaClient::new(config),
            tokens: TokenManager::new(Provider::Strava, db.clone(), token_cache, refresh_locks),
            db,
        }
    }

    pub fn client(&self) -> &StravaClient {
        &self.client
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Get a valid (non-expired) access token for the given athlete.
    pub async fn get_valid_access_token(&self, athlete_id: u64) -> Result<String, AppError> {
        self.tokens
            .get_valid_access_token(&self.client, athlete_id)
            .await
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Handle OAuth callback: exchange code for tokens, store user and tokens.
    pub async fn handle_oauth_callback(&self, code: &str) -> Result<OAuthResult, AppError> {
        let token_response = self.client.exchange_code(code).await?;
        let expires_at = format_utc_rfc3339(expiry_from_timestamp(token_response.expires_at)?);

        let athlete_id = token_response.athlete.id;
        let now = format_utc_rfc3339(Utc::now());

        // Keep an existing Spotify link when the user reconnects Strava.
        let existing = self.db.get_user(athlete_id).await?;
        let user = User {
            strava_athlete_id: athlete_id,
            firstname: token_response.athlete.firstname.clone(),
            lastname: token_response.athlete.lastname.clone(),
            spotify_user_id: existing.as_ref().and_then(|u| u.spotify_user_id.clone()),
            created_at: existing
                .as_ref()
                .map(|u| u.created_at.clone())
                .unwrap_or_else(|| now.clone()),
            last_active: now,
        };
        self.db.upsert_user(&user).await?;

        let tokens = ProviderTokens {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            expires_at,
            scopes: STRAVA_SCOPES.split(',').map(String::from).collect(),
        };
        self.tokens.store(athlete_id, &tokens).await?;

        tracing::info!(
            athlete_id,
            firstname = %user.firstname,
            "Strava OAuth callback handled, user and tokens stored"
        );

        Ok(OAuthResult {
            athlete_id,
            firstname: user.firstname,
            lastname: user.lastname,
        })
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// Get a detailed activity by ID.
    pub async fn get_activity(
        &self,
        athlete_id: u64,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let access_token = self.get_valid_access_token(athlete_id).await?;
        self.client.get_activity(&access_token, activity_id).await
    }

    /// Get the time and heart-rate streams of an activity.
    pub async fn get_heart_rate_stream(
        &self,
        athlete_id: u64,
        activity_id: u64,
    ) -> Result<HeartRateStream, AppError> {
        let access_token = self.get_valid_access_token(athlete_id).await?;
        self.client
            .get_heart_rate_stream(&access_token, activity_id)
            .await
    }

    /// Update an activity's description.
    pub async fn update_activity_description(
        &self,
        athlete_id: u64,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let access_token = self.get_valid_access_token(athlete_id).await?;
        self.client
            .update_activity_description(&access_token, activity_id, description)
            .await
    }

    /// Verify that the user's token is still valid by making a request to Strava.
    ///
    /// Returns Ok(true) if active, Ok(false) if revoked/expired, Err on other errors.
    pub async fn verify_token_active(&self, athlete_id: u64) -> Result<bool, AppError> {
        let access_token = match self.get_valid_access_token(athlete_id).await {
            Ok(t) => t,
            Err(e) if e.is_token_error() => return Ok(false),
            Err(e) => return Err(e),
        };

        match self.client.get_athlete(&access_token).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_token_error() => {
                self.tokens.evict(athlete_id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete local Strava tokens and, if we still hold a token, deauthorize with Strava.
    pub async fn disconnect(&self, athlete_id: u64) -> Result<(), AppError> {
        let Some(tokens) = self.tokens.revoke(athlete_id).await? else {
            return Ok(());
        };

        if let Err(e) = self.client.deauthorize(&tokens.access_token).await {
            tracing::warn!(
                error = %e,
                athlete_id,
                "Strava deauthorization failed (local tokens already deleted)"
            );
        }
        Ok(())
    }
}

/// Result of handling OAuth callback.
#[derive(Debug, Clone)]
pub struct OAuthResult {
    pub athlete_id: u64,
    pub firstname: String,
    pub lastname: String,
}
