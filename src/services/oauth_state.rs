// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed OAuth `state` parameters.
//!
//! Format before encoding: `payload|timestamp_hex|signature_hex`, where the
//! signature is HMAC-SHA256 over `payload|timestamp_hex`. The whole string is
//! URL-safe base64 without padding.

use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long a user may sit on a provider's consent screen.
pub const STATE_MAX_AGE_MINUTES: i64 = 10;

/// Sign `payload` into an opaque state parameter.
pub fn sign_state(payload: &str, secret: &[u8], now: DateTime<Utc>) -> Result<String, AppError> {
    let signed_part = format!("{}|{:x}", payload, now.timestamp_millis());
    let mac = mac(secret, &signed_part)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", signed_part, signature)))
}

/// Verify a state parameter and return its payload.
///
/// Fails on bad encoding, a signature mismatch, or a state older than
/// [`STATE_MAX_AGE_MINUTES`].
pub fn verify_state(state: &str, secret: &[u8], now: DateTime<Utc>) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // The payload itself may contain '|', so split from the right.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let payload = parts.next()?;

    let expected = mac(secret, &format!("{}|{}", payload, timestamp_hex))
        .ok()?
        .finalize()
        .into_bytes();
    let signature = hex::decode(signature_hex).ok()?;
    if !bool::from(expected.as_slice().ct_eq(&signature)) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_ms = i64::from_str_radix(timestamp_hex, 16).ok()?;
    let issued_at = DateTime::from_timestamp_millis(issued_ms)?;
    let age = now - issued_at;
    if age > Duration::minutes(STATE_MAX_AGE_MINUTES) || age < -Duration::minutes(1) {
        tracing::warn!(age_secs = age.num_seconds(), "OAuth state expired");
        return None;
    }

    Some(payload.to_string())
}

fn mac(secret: &[u8], data: &str) -> Result<HmacSha256, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret)?;
    mac.update(data.as_bytes());
    Ok(mac)
}
