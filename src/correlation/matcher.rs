// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Match a moment in time against a user's play history.

use crate::models::PlayedTrack;
use chrono::{DateTime, Utc};

/// Find the track that was playing at `target`.
///
/// `history` must be newest-first, the order Spotify returns it in. Windows
/// are scanned oldest-first and both boundaries count as inside. Once a
/// window starts after `target` the scan stops: the target fell into a gap
/// in listening (or before the fetched history), which is a normal miss.
pub fn match_track(target: DateTime<Utc>, history: &[PlayedTrack]) -> Option<&PlayedTrack> {
    for item in history.iter().rev() {
        let (start, end) = item.play_window();

        if start <= target && target <= end {
            return Some(item);
        }
        if start < target && end < target {
            continue;
        }

        tracing::debug!(
            at = %target,
            window_start = %start,
            "Passed target without a containing play window"
        );
        return None;
    }

    None
}
