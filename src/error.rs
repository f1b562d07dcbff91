// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::models::Provider;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Strava API error: {0}")]
    StravaApi(String),

    #[error("Spotify API error: {0}")]
    SpotifyApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message used when a provider rejects our access or refresh token.
    pub const TOKEN_ERROR: &'static str = "Token expired or invalid";
    /// Message used when a provider rate-limits us.
    pub const RATE_LIMIT: &'static str = "Rate limit exceeded";

    /// Build the API error variant for a provider.
    pub fn provider(provider: Provider, msg: impl Into<String>) -> Self {
        match provider {
            Provider::Strava => AppError::StravaApi(msg.into()),
            Provider::Spotify => AppError::SpotifyApi(msg.into()),
        }
    }

    /// True if a provider rejected the access token (401) or the refresh token.
    pub fn is_token_error(&self) -> bool {
        match self {
            AppError::StravaApi(msg) | AppError::SpotifyApi(msg) => {
                msg == Self::TOKEN_ERROR || self.is_invalid_grant()
            }
            _ => false,
        }
    }

    /// True if a provider refused a refresh token.
    ///
    /// Spotify answers `{"error":"invalid_grant"}`; Strava answers with an
    /// `"code":"invalid"` entry for the `refresh_token` field.
    pub fn is_invalid_grant(&self) -> bool {
        match self {
            AppError::StravaApi(msg) | AppError::SpotifyApi(msg) => {
                msg.contains("invalid_grant")
                    || (msg.contains("refresh_token") && msg.contains(r#""code":"invalid""#))
            }
            _ => false,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::StravaApi(msg) => {
                (StatusCode::BAD_GATEWAY, "strava_error", Some(msg.clone()))
            }
            AppError::SpotifyApi(msg) => {
                (StatusCode::BAD_GATEWAY, "spotify_error", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
