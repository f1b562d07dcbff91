// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Theme-song processing service.
//!
//! Handles the core workflow for one activity:
//! 1. Fetch activity and heart-rate stream from Strava
//! 2. Locate the peak heart rate in absolute time
//! 3. Fetch Spotify history for the 30 minutes before the peak
//! 4. Match the peak against play windows
//! 5. Append the theme song to the activity description (once)

use crate::correlation::{self, annotate_description, CorrelationResult};
use crate::error::Result;
use crate::services::spotify::MAX_HISTORY_LIMIT;
use crate::services::{SpotifyService, StravaService};
use chrono::Duration;
use serde::Serialize;

/// How far before the peak to ask Spotify for history.
const HISTORY_LOOKBACK_MINUTES: i64 = 30;

/// Correlate an activity's peak heart rate with the track playing at the time.
pub struct ThemeSongProcessor {
    strava: StravaService,
    spotify: SpotifyService,
}

impl ThemeSongProcessor {
    pub fn new(strava: StravaService, spotify: SpotifyService) -> Self {
        Self { strava, spotify }
    }

    /// Process an activity by ID.
    ///
    /// "No peak" and "no track" are normal outcomes. Provider failures are
    /// returned as errors and nothing is retried here.
    pub async fn process(&self, athlete_id: u64, activity_id: u64) -> Result<ProcessOutcome> {
        tracing::info!(athlete_id, activity_id, "Processing activity");

        let activity = self.strava.get_activity(athlete_id, activity_id).await?;
        let stream = self
            .strava
            .get_heart_rate_stream(athlete_id, activity_id)
            .await?;

        let Some(peak) = correlation::peak_moment(activity.start_date, &stream) else {
            tracing::info!(
                athlete_id,
                activity_id,
                samples = stream.heartrate.len(),
                "Could not find a max heart rate for activity"
            );
            return Ok(ProcessOutcome::NoPeak);
        };

        let after = peak.at - Duration::minutes(HISTORY_LOOKBACK_MINUTES);
        let history = self
            .spotify
            .get_play_history(athlete_id, after, MAX_HISTORY_LIMIT)
            .await?;

        let result = correlation::correlate(peak, &history);
        match &result.track {
            Some(played) => tracing::info!(
                activity_id,
                peak_at = %peak.at,
                heart_rate = peak.heart_rate,
                track_id = %played.track.id,
                "Matched track at peak heart rate"
            ),
            None => tracing::info!(
                activity_id,
                peak_at = %peak.at,
                history_len = history.len(),
                "Could not find a track for peak heart rate"
            ),
        }

        let line = result.theme_song_line();
        let Some(description) = annotate_description(activity.description.as_deref(), &line) else {
            tracing::debug!(activity_id, "Activity already annotated (idempotent skip)");
            return Ok(ProcessOutcome::AlreadyAnnotated { result });
        };

        self.strava
            .update_activity_description(athlete_id, activity_id, &description)
            .await?;

        tracing::info!(athlete_id, activity_id, "Theme song added to activity");
        Ok(ProcessOutcome::Annotated {
            result,
            description,
        })
    }
}

/// Result of processing an activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Stream had no heart-rate samples
    NoPeak,
    /// Description already carried a theme song; nothing written
    AlreadyAnnotated { result: CorrelationResult },
    /// Description written back to Strava
    Annotated {
        result: CorrelationResult,
        description: String,
    },
}
