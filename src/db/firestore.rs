// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile and account links)
//! - Tokens (OAuth tokens per provider)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Provider, ProviderTokens, User};
use crate::time_utils::format_utc_rfc3339;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by their Strava athlete ID.
    pub async fn get_user(&self, athlete_id: u64) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user.strava_athlete_id.to_string())
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Record the Spotify account linked to a user.
    ///
    /// Fails with `NotFound` if the user has never connected Strava.
    pub async fn link_spotify_user(
        &self,
        athlete_id: u64,
        spotify_user_id: &str,
    ) -> Result<User, AppError> {
        let mut user = self
            .get_user(athlete_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", athlete_id)))?;

        user.spotify_user_id = Some(spotify_user_id.to_string());
        user.last_active = format_utc_rfc3339(chrono::Utc::now());
        self.upsert_user(&user).await?;
        Ok(user)
    }

    /// Delete a user and every credential stored for them.
    pub async fn delete_user(&self, athlete_id: u64) -> Result<(), AppError> {
        for provider in [Provider::Strava, Provider::Spotify] {
            self.delete_tokens(provider, athlete_id).await?;
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(athlete_id.to_string())
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(athlete_id, "User deleted");
        Ok(())
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get a user's tokens for a provider.
    pub async fn get_tokens(
        &self,
        provider: Provider,
        athlete_id: u64,
    ) -> Result<Option<ProviderTokens>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(provider.collection())
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a user's tokens for a provider.
    pub async fn set_tokens(
        &self,
        provider: Provider,
        athlete_id: u64,
        tokens: &ProviderTokens,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(provider.collection())
            .document_id(athlete_id.to_string())
            .object(tokens)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a user's tokens for a provider (for deauthorization).
    pub async fn delete_tokens(&self, provider: Provider, athlete_id: u64) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(provider.collection())
            .document_id(athlete_id.to_string())
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
