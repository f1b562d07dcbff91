// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::User;
use crate::AppState;
use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/me", get(get_me).delete(delete_account))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub athlete_id: u64,
    pub firstname: String,
    pub lastname: String,
    pub spotify_user_id: Option<String>,
    /// True once a Spotify account is linked and theme songs can be found
    pub spotify_linked: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            athlete_id: user.strava_athlete_id,
            firstname: user.firstname,
            lastname: user.lastname,
            spotify_linked: user.spotify_user_id.is_some(),
            spotify_user_id: user.spotify_user_id,
        }
    }
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(user.athlete_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.athlete_id)))?;

    Ok(Json(profile.into()))
}

// ─── Account Deletion ────────────────────────────────────────

/// Response for account deletion.
#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub message: String,
}

/// Delete the user's account, deauthorizing the app with Strava first.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DeleteAccountResponse>> {
    tracing::info!(
        athlete_id = user.athlete_id,
        "User-initiated account deletion"
    );

    // Deletes the stored Strava tokens; a failed deauthorize call is only logged.
    state.strava_service.disconnect(user.athlete_id).await?;
    state.spotify_service.disconnect(user.athlete_id).await?;
    remove_user_data(&state, user.athlete_id).await?;

    Ok(Json(DeleteAccountResponse {
        success: true,
        message: "Account deleted.".to_string(),
    }))
}

/// Delete the user record and all stored credentials, and evict cached tokens.
pub(crate) async fn remove_user_data(state: &AppState, athlete_id: u64) -> Result<()> {
    state.strava_service.tokens().evict(athlete_id);
    state.spotify_service.tokens().evict(athlete_id);
    state.db.delete_user(athlete_id).await
}
