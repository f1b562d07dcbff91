// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Theme-song text for Strava activity descriptions.

use crate::models::Track;

/// Marker used to detect if an activity has already been annotated.
pub const THEME_SONG_MARKER: &str = "Theme Song:";

/// Line written when nothing was playing at the peak.
const SILENCE: &str = "sweet sounds of silence";

/// Build the theme-song line for a matched track, or the silence fallback.
pub fn theme_song_line(track: Option<&Track>) -> String {
    let Some(track) = track else {
        return format!("{} {}", THEME_SONG_MARKER, SILENCE);
    };

    let artists: Vec<&str> = track.artists.iter().map(|a| a.name.as_str()).collect();
    if artists.is_empty() {
        format!("{} {} - {}", THEME_SONG_MARKER, track.name, track.link())
    } else {
        format!(
            "{} {} by {} - {}",
            THEME_SONG_MARKER,
            track.name,
            artists.join(", "),
            track.link()
        )
    }
}

/// Whether a description already carries a theme song.
pub fn is_annotated(description: Option<&str>) -> bool {
    description.is_some_and(|d| d.contains(THEME_SONG_MARKER))
}

/// Append `line` to an existing description.
///
/// Returns `None` when the description is already annotated.
pub fn annotate_description(existing: Option<&str>, line: &str) -> Option<String> {
    if is_annotated(existing) {
        return None;
    }

    Some(match existing {
        Some(desc) if !desc.is_empty() => format!("{}\n{}", desc, line),
        _ => line.to_string(),
    })
}
