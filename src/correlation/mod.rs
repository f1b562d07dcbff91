// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Heart-rate to track correlation.
//!
//! Pure functions only; fetching streams and history and writing the
//! description back live in [`crate::services::theme_song`].

pub mod description;
pub mod matcher;
pub mod peak;

pub use description::{annotate_description, is_annotated, theme_song_line, THEME_SONG_MARKER};
pub use matcher::match_track;
pub use peak::{find_peak, Peak};

use crate::models::PlayedTrack;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parallel elapsed-time and heart-rate series for one activity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeartRateStream {
    /// Seconds since activity start
    pub time: Vec<f64>,
    /// Beats per minute
    pub heartrate: Vec<f64>,
}

/// Absolute moment of peak heart rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakMoment {
    pub at: DateTime<Utc>,
    pub heart_rate: f64,
}

/// Outcome of matching a peak against play history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub peak: PeakMoment,
    /// `None` when nothing was playing at the peak
    pub track: Option<PlayedTrack>,
}

impl CorrelationResult {
    /// The description line recording this result.
    pub fn theme_song_line(&self) -> String {
        theme_song_line(self.track.as_ref().map(|p| &p.track))
    }
}

/// Locate the peak of `stream` in absolute time.
pub fn peak_moment(start_date: DateTime<Utc>, stream: &HeartRateStream) -> Option<PeakMoment> {
    let peak = find_peak(&stream.time, &stream.heartrate)?;
    Some(PeakMoment {
        at: start_date.checked_add_signed(peak.offset)?,
        heart_rate: peak.heart_rate,
    })
}

/// Match a peak against newest-first play history.
pub fn correlate(peak: PeakMoment, history: &[PlayedTrack]) -> CorrelationResult {
    CorrelationResult {
        peak,
        track: match_track(peak.at, history).cloned(),
    }
}
