// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup and passed explicitly to every client that needs
//! credentials or endpoints.

use std::env;

const DEFAULT_STRAVA_API_URL: &str = "https://www.strava.com/api/v3";
const DEFAULT_STRAVA_OAUTH_URL: &str = "https://www.strava.com/oauth";
const DEFAULT_SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Spotify OAuth client ID (public)
    pub spotify_client_id: String,
    /// Public URL of this API (used for OAuth redirect URIs)
    pub api_url: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,

    // --- Provider endpoints (overridable for local testing) ---
    pub strava_api_url: String,
    pub strava_oauth_url: String,
    pub spotify_api_url: String,
    pub spotify_accounts_url: String,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Spotify OAuth client secret
    pub spotify_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for signing OAuth state parameters
    pub oauth_state_key: Vec<u8>,
    /// Webhook verification token
    pub webhook_verify_token: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = required("JWT_SIGNING_KEY")?.into_bytes();
        let oauth_state_key = env::var("OAUTH_STATE_KEY")
            .map(String::into_bytes)
            .unwrap_or_else(|_| jwt_signing_key.clone());

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            spotify_client_id: required("SPOTIFY_CLIENT_ID")?,
            api_url: env::var("API_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: match env::var("PORT") {
                Ok(v) => v
                    .parse()
                    .map_err(|_| ConfigError::Invalid("PORT", v.clone()))?,
                Err(_) => 8080,
            },

            strava_api_url: env::var("STRAVA_API_URL")
                .unwrap_or_else(|_| DEFAULT_STRAVA_API_URL.to_string()),
            strava_oauth_url: env::var("STRAVA_OAUTH_URL")
                .unwrap_or_else(|_| DEFAULT_STRAVA_OAUTH_URL.to_string()),
            spotify_api_url: env::var("SPOTIFY_API_URL")
                .unwrap_or_else(|_| DEFAULT_SPOTIFY_API_URL.to_string()),
            spotify_accounts_url: env::var("SPOTIFY_ACCOUNTS_URL")
                .unwrap_or_else(|_| DEFAULT_SPOTIFY_ACCOUNTS_URL.to_string()),

            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            spotify_client_secret: required("SPOTIFY_CLIENT_SECRET")?,
            jwt_signing_key,
            oauth_state_key,
            webhook_verify_token: required("STRAVA_WEBHOOK_TOKEN")?,
        })
    }

    /// Config for tests only. Provider URLs point nowhere routable.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "1234567890".to_string(),
            spotify_client_id: "0987654321".to_string(),
            api_url: "https://api.example.test".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            strava_api_url: "http://127.0.0.1:9/api/v3".to_string(),
            strava_oauth_url: "http://127.0.0.1:9/oauth".to_string(),
            spotify_api_url: "http://127.0.0.1:9/v1".to_string(),
            spotify_accounts_url: "http://127.0.0.1:9".to_string(),
            strava_client_secret: "test_strava_secret".to_string(),
            spotify_client_secret: "test_spotify_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
            webhook_verify_token: "test_verify_token".to_string(),
        }
    }

    /// Redirect URI registered with Strava.
    pub fn strava_redirect_uri(&self) -> String {
        format!("{}/strava/authorization", self.api_url)
    }

    /// Redirect URI registered with Spotify.
    pub fn spotify_redirect_uri(&self) -> String {
        format!("{}/spotify/authorization", self.api_url)
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
