// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token lifecycle shared by the Strava and Spotify services.
//!
//! Each provider gets its own [`TokenManager`] holding:
//! - an in-memory cache of access tokens (avoids a Firestore read per call)
//! - per-athlete refresh locks so concurrent requests refresh only once
//! - the Firestore collection where tokens persist

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Provider, ProviderTokens};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Cached access token with expiry information.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Shared token cache type, keyed by Strava athlete ID.
pub type TokenCache = Arc<DashMap<u64, CachedToken>>;

/// Shared refresh locks type, keyed by Strava athlete ID.
pub type RefreshLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// Tokens returned by a provider's refresh endpoint.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access_token: String,
    /// Spotify may omit this, in which case the old refresh token stays valid.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// A provider client able to trade a refresh token for a new access token.
pub trait TokenRefresher {
    fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<RefreshedTokens, AppError>> + Send;
}

/// Token storage and refresh for one provider.
#[derive(Clone)]
pub struct TokenManager {
    provider: Provider,
    db: FirestoreDb,
    cache: TokenCache,
    refresh_locks: RefreshLocks,
}

impl TokenManager {
    pub fn new(
        provider: Provider,
        db: FirestoreDb,
        cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Self {
        Self {
            provider,
            db,
            cache,
            refresh_locks,
        }
    }

    /// Get a valid (non-expired) access token for the given athlete.
    ///
    /// 1. Check in-memory cache (no I/O)
    /// 2. Acquire the athlete's refresh lock and re-check the cache
    /// 3. Load tokens from Firestore; cache and return if still valid
    /// 4. Otherwise refresh with the provider, persist, and cache
    ///
    /// If the provider rejects the refresh token, another instance may have
    /// already refreshed. Its tokens are used only if Firestore now holds a
    /// fresh access token; otherwise the rejection is returned.
    pub async fn get_valid_access_token<R>(
        &self,
        refresher: &R,
        athlete_id: u64,
    ) -> Result<String, AppError>
    where
        R: TokenRefresher + Sync,
    {
        let now = Utc::now();

        if let Some(token) = self.cached(athlete_id, now) {
            return Ok(token);
        }

        let lock = self
            .refresh_locks
            .entry(athlete_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        if let Some(token) = self.cached(athlete_id, now) {
            return Ok(token);
        }

        let tokens = self.load(athlete_id).await?;
        let expires_at = parse_expiry(&tokens.expires_at)?;

        if CachedToken::new("", expires_at).is_fresh(now) {
            self.cache_token(athlete_id, tokens.access_token.clone(), expires_at);
            return Ok(tokens.access_token);
        }

        tracing::info!(athlete_id, provider = %self.provider, "Access token expired, refreshing");

        let refreshed = match refresher.refresh_token(&tokens.refresh_token).await {
            Ok(t) => t,
            Err(e) if e.is_invalid_grant() => {
                let current = self.load(athlete_id).await?;
                let expires_at = parse_expiry(&current.expires_at)?;
                if !CachedToken::new("", expires_at).is_fresh(Utc::now()) {
                    tracing::warn!(
                        athlete_id,
                        provider = %self.provider,
                        error = %e,
                        "Refresh token rejected"
                    );
                    return Err(e);
                }

                tracing::info!(
                    athlete_id,
                    provider = %self.provider,
                    "Refresh token race detected - another instance won, using their tokens"
                );
                self.cache_token(athlete_id, current.access_token.clone(), expires_at);
                return Ok(current.access_token);
            }
            Err(e) => return Err(e),
        };

        let updated = ProviderTokens {
            access_token: refreshed.access_token.clone(),
            refresh_token: refreshed.refresh_token.unwrap_or(tokens.refresh_token),
            expires_at: format_utc_rfc3339(refreshed.expires_at),
            scopes: tokens.scopes,
        };
        self.db.set_tokens(self.provider, athlete_id, &updated).await?;
        self.cache_token(
            athlete_id,
            refreshed.access_token.clone(),
            refreshed.expires_at,
        );

        tracing::info!(athlete_id, provider = %self.provider, "Token refreshed and cached");
        Ok(refreshed.access_token)
    }

    /// Persist freshly issued tokens (OAuth callback) and cache the access token.
    pub async fn store(&self, athlete_id: u64, tokens: &ProviderTokens) -> Result<(), AppError> {
        let expires_at = parse_expiry(&tokens.expires_at)?;
        self.db.set_tokens(self.provider, athlete_id, tokens).await?;
        self.cache_token(athlete_id, tokens.access_token.clone(), expires_at);
        Ok(())
    }

    /// Put an access token into the in-memory cache.
    pub fn cache_token(&self, athlete_id: u64, access_token: String, expires_at: DateTime<Utc>) {
        self.cache.insert(athlete_id, CachedToken::new(access_token, expires_at));
    }

    pub fn is_cached(&self, athlete_id: u64) -> bool {
        self.cache.contains_key(&athlete_id)
    }

    /// Drop any cached token for the athlete.
    pub fn evict(&self, athlete_id: u64) {
        self.cache.remove(&athlete_id);
        self.refresh_locks.remove(&athlete_id);
    }

    /// Delete stored tokens and evict the cache.
    ///
    /// Returns what was stored so the caller can still deauthorize with it.
    pub async fn revoke(&self, athlete_id: u64) -> Result<Option<ProviderTokens>, AppError> {
        self.evict(athlete_id);
        let tokens = self.db.get_tokens(self.provider, athlete_id).await?;
        if tokens.is_some() {
            self.db.delete_tokens(self.provider, athlete_id).await?;
        }
        Ok(tokens)
    }

    fn cached(&self, athlete_id: u64, now: DateTime<Utc>) -> Option<String> {
        self.cache
            .get(&athlete_id)
            .filter(|cached| cached.is_fresh(now))
            .map(|cached| cached.access_token.clone())
    }

    async fn load(&self, athlete_id: u64) -> Result<ProviderTokens, AppError> {
        self.db
            .get_tokens(self.provider, athlete_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "{} tokens for athlete {}",
                    self.provider, athlete_id
                ))
            })
    }
}

fn parse_expiry(expires_at: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(expires_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to parse expiry: {}", e)))
}
