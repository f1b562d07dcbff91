// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Strava events.

use crate::error::AppError;
use crate::routes::api::remove_user_data;
use crate::AppState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/strava/webhook", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: String,
    #[serde(rename = "hub.challenge")]
    challenge: String,
    #[serde(rename = "hub.verify_token")]
    verify_token: String,
}

/// Verification response.
#[derive(Serialize)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Verify webhook subscription (GET).
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Response {
    if params.mode == "subscribe" && params.verify_token == state.config.webhook_verify_token {
        tracing::info!("Webhook subscription verified");
        Json(VerifyResponse {
            challenge: params.challenge,
        })
        .into_response()
    } else {
        tracing::warn!(mode = %params.mode, "Webhook verification failed: invalid token");
        StatusCode::FORBIDDEN.into_response()
    }
}

/// Kind of object a webhook event is about.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Activity,
    Athlete,
}

/// What happened to the object.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AspectType {
    Create,
    Update,
    Delete,
}

/// Strava webhook event payload.
#[derive(Deserialize, Debug, Validate)]
pub struct WebhookEvent {
    pub object_type: ObjectType,
    #[validate(range(min = 1))]
    pub object_id: u64,
    pub aspect_type: AspectType,
    /// Athlete who owns the object
    #[validate(range(min = 1))]
    pub owner_id: u64,
    #[serde(default)]
    pub subscription_id: Option<u64>,
    #[serde(default)]
    pub event_time: Option<i64>,
    /// For athlete events, contains {"authorized": "false"} on deauthorization
    #[serde(default)]
    pub updates: Option<HashMap<String, serde_json::Value>>,
}

/// What the service does in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAction {
    ProcessActivity { athlete_id: u64, activity_id: u64 },
    Deauthorize { athlete_id: u64 },
    Ignore,
}

impl WebhookEvent {
    /// Deserialize and validate a raw payload.
    pub fn parse(payload: serde_json::Value) -> Result<Self, AppError> {
        let event: WebhookEvent = serde_json::from_value(payload)
            .map_err(|e| AppError::BadRequest(format!("Malformed webhook event: {}", e)))?;
        event
            .validate()
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook event: {}", e)))?;
        Ok(event)
    }

    /// Strava sends object_type="athlete", aspect_type="update",
    /// updates={"authorized": "false"} when a user revokes access.
    pub fn is_deauthorization(&self) -> bool {
        self.object_type == ObjectType::Athlete
            && self.aspect_type == AspectType::Update
            && self
                .updates
                .as_ref()
                .and_then(|u| u.get("authorized"))
                .is_some_and(|v| v == false || v == "false")
    }

    pub fn action(&self) -> WebhookAction {
        match (self.object_type, self.aspect_type) {
            (ObjectType::Activity, AspectType::Create | AspectType::Update) => {
                WebhookAction::ProcessActivity {
                    athlete_id: self.owner_id,
                    activity_id: self.object_id,
                }
            }
            _ if self.is_deauthorization() => WebhookAction::Deauthorize {
                athlete_id: self.owner_id,
            },
            _ => WebhookAction::Ignore,
        }
    }
}

/// Handle incoming webhook events (POST).
///
/// Activity events are processed before responding so the caller sees the
/// outcome. Everything else answers 200 so Strava does not retry.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    tracing::debug!(payload = %payload, "Webhook event received (raw)");

    let event = match WebhookEvent::parse(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse webhook event");
            return StatusCode::OK.into_response();
        }
    };

    tracing::info!(
        object_type = ?event.object_type,
        object_id = event.object_id,
        aspect_type = ?event.aspect_type,
        owner_id = event.owner_id,
        "Webhook event parsed successfully"
    );

    match event.action() {
        WebhookAction::ProcessActivity {
            athlete_id,
            activity_id,
        } => match state
            .theme_song_processor()
            .process(athlete_id, activity_id)
            .await
        {
            Ok(outcome) => Json(outcome).into_response(),
            Err(e) => {
                tracing::error!(error = %e, athlete_id, activity_id, "Failed to process activity");
                e.into_response()
            }
        },
        WebhookAction::Deauthorize { athlete_id } => {
            handle_deauthorization(&state, athlete_id).await;
            StatusCode::OK.into_response()
        }
        WebhookAction::Ignore => {
            tracing::debug!(
                object_type = ?event.object_type,
                aspect_type = ?event.aspect_type,
                "Ignoring unhandled event type"
            );
            StatusCode::OK.into_response()
        }
    }
}

/// Delete a user's data after checking with Strava that access really was revoked.
async fn handle_deauthorization(state: &AppState, athlete_id: u64) {
    let revoked = match state.strava_service.verify_token_active(athlete_id).await {
        Ok(true) => {
            tracing::warn!(
                athlete_id,
                "Security Alert: Received FAKE deauthorization webhook (token still valid)"
            );
            false
        }
        Ok(false) => true,
        // No tokens stored: user already gone or never authorized.
        Err(AppError::NotFound(_)) => true,
        Err(e) => {
            tracing::warn!(error = %e, athlete_id, "Failed to verify deauthorization (assuming real)");
            true
        }
    };

    if !revoked {
        return;
    }

    match remove_user_data(state, athlete_id).await {
        Ok(()) => tracing::info!(athlete_id, "User data deleted after deauthorization"),
        Err(e) => tracing::error!(error = %e, athlete_id, "Failed to delete deauthorized user"),
    }
}
