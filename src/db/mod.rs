//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Strava OAuth tokens (keyed by athlete_id)
    pub const STRAVA_TOKENS: &str = "strava_tokens";
    /// Spotify OAuth tokens (keyed by the linking athlete_id)
    pub const SPOTIFY_TOKENS: &str = "spotify_tokens";
}
