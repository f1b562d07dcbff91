// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response handling shared by the provider API clients.

use crate::error::AppError;
use crate::models::Provider;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

/// Check response status and return error if not successful.
///
/// 401 maps to [`AppError::TOKEN_ERROR`] and 429 to [`AppError::RATE_LIMIT`]
/// so callers can react without parsing provider bodies.
pub(crate) async fn check_response(
    provider: Provider,
    response: reqwest::Response,
) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            tracing::warn!(%provider, "Provider rate limit hit (429)");
            Err(AppError::provider(provider, AppError::RATE_LIMIT))
        }
        StatusCode::UNAUTHORIZED => Err(AppError::provider(provider, AppError::TOKEN_ERROR)),
        StatusCode::NOT_FOUND => Err(AppError::NotFound(format!(
            "{} resource (HTTP 404): {}",
            provider, body
        ))),
        _ => Err(AppError::provider(
            provider,
            format!("HTTP {}: {}", status, body),
        )),
    }
}

/// Check response and parse JSON body.
pub(crate) async fn check_response_json<T: DeserializeOwned>(
    provider: Provider,
    response: reqwest::Response,
) -> Result<T, AppError> {
    check_response(provider, response)
        .await?
        .json()
        .await
        .map_err(|e| AppError::provider(provider, format!("JSON parse error: {}", e)))
}

/// Map a transport failure (DNS, connect, timeout) to a provider error.
pub(crate) fn transport_error(provider: Provider, context: &str, err: reqwest::Error) -> AppError {
    AppError::provider(provider, format!("{}: {}", context, err))
}
