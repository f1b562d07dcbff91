// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava and Spotify OAuth routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Extension, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, removal_cookie, session_cookie, AuthUser};
use crate::services::oauth_state::{sign_state, verify_state};
use crate::AppState;

/// State payload for the Strava flow.
const STRAVA_STATE: &str = "strava";
/// State payload prefix for the Spotify flow; followed by the athlete ID.
const SPOTIFY_STATE_PREFIX: &str = "spotify:";

/// Routes that start or finish a login without a session.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/strava/login", get(strava_login))
        .route("/strava/authorization", get(strava_callback))
        .route("/spotify/authorization", get(spotify_callback))
        .route("/auth/logout", get(logout))
}

/// Routes that need a Strava session (auth layer applied in routes/mod.rs).
pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new().route("/spotify/login", get(spotify_login))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

impl CallbackParams {
    /// Redirect for a provider-reported error, if any.
    fn error_redirect(&self, frontend_url: &str, provider: &str) -> Option<Redirect> {
        let error = self.error.as_deref()?;
        tracing::warn!(%provider, error = %error, "OAuth error from provider");
        Some(Redirect::temporary(&format!(
            "{}?error={}",
            frontend_url,
            urlencoding::encode(error)
        )))
    }

    fn code(&self) -> Result<&str> {
        self.code
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Missing 'code' parameter".to_string()))
    }
}

/// Start Strava OAuth - redirect to the consent screen.
async fn strava_login(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let oauth_state = sign_state(STRAVA_STATE, &state.config.oauth_state_key, Utc::now())?;
    let auth_url = state
        .strava_service
        .client()
        .authorize_url(&state.config.strava_redirect_uri(), &oauth_state);

    tracing::info!(
        client_id = %state.config.strava_client_id,
        "Starting Strava OAuth flow"
    );
    Ok(Redirect::temporary(&auth_url))
}

/// Strava OAuth callback - exchange code, store user and tokens, start a session.
async fn strava_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    match verify_state(&params.state, &state.config.oauth_state_key, Utc::now()) {
        Some(payload) if payload == STRAVA_STATE => {}
        _ => return Err(AppError::Forbidden("Invalid OAuth state".to_string())),
    }

    if let Some(redirect) = params.error_redirect(&state.config.frontend_url, "strava") {
        return Ok((jar, redirect));
    }

    tracing::info!("Exchanging Strava authorization code for tokens");
    let oauth_result = state
        .strava_service
        .handle_oauth_callback(params.code()?)
        .await?;

    let jwt = create_jwt(oauth_result.athlete_id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let redirect_url = format!(
        "{}/strava/{}",
        state.config.frontend_url, oauth_result.athlete_id
    );
    Ok((
        jar.add(session_cookie(jwt)),
        Redirect::temporary(&redirect_url),
    ))
}

/// Start Spotify OAuth for the signed-in athlete.
async fn spotify_login(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Redirect> {
    let payload = format!("{}{}", SPOTIFY_STATE_PREFIX, user.athlete_id);
    let oauth_state = sign_state(&payload, &state.config.oauth_state_key, Utc::now())?;
    let auth_url = state
        .spotify_service
        .client()
        .authorize_url(&state.config.spotify_redirect_uri(), &oauth_state);

    tracing::info!(athlete_id = user.athlete_id, "Starting Spotify OAuth flow");
    Ok(Redirect::temporary(&auth_url))
}

/// Spotify OAuth callback - link the Spotify account to the athlete in the state.
async fn spotify_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let athlete_id = verify_state(&params.state, &state.config.oauth_state_key, Utc::now())
        .and_then(|payload| parse_spotify_state(&payload))
        .ok_or_else(|| AppError::Forbidden("Invalid OAuth state".to_string()))?;

    if let Some(redirect) = params.error_redirect(&state.config.frontend_url, "spotify") {
        return Ok(redirect);
    }

    let spotify_user = state
        .spotify_service
        .handle_oauth_callback(
            athlete_id,
            params.code()?,
            &state.config.spotify_redirect_uri(),
        )
        .await?;

    Ok(Redirect::temporary(&format!(
        "{}/spotify/{}",
        state.config.frontend_url,
        urlencoding::encode(&spotify_user.id)
    )))
}

fn parse_spotify_state(payload: &str) -> Option<u64> {
    payload.strip_prefix(SPOTIFY_STATE_PREFIX)?.parse().ok()
}

/// Logout - clear the session cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    (
        jar.remove(removal_cookie()),
        Redirect::temporary(&state.config.frontend_url),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spotify_state() {
        assert_eq!(parse_spotify_state("spotify:12345"), Some(12345));
        assert_eq!(parse_spotify_state("strava"), None);
        assert_eq!(parse_spotify_state("spotify:abc"), None);
        assert_eq!(parse_spotify_state("spotify:"), None);
    }
}
