//! Remote media backend contract and error taxonomy.
//!
//! The matching core only ever talks to the server through these traits,
//! so it can be exercised in tests with in-memory fakes.

use thiserror::Error;

use crate::models::{CandidateTrack, TrackId};

// ============================================================================
// Errors
// ============================================================================

/// Backend failure classification. Retry behavior follows the variant, not
/// the message: only `Transient` is ever retried.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Timeouts, rate limits, 5xx responses. Retryable with backoff.
    #[error("transient backend error: {0}")]
    Transient(String),

    /// The library catalog cannot be enumerated. Fatal to the whole run.
    #[error("library unavailable: {0}")]
    LibraryUnavailable(String),

    /// A playlist mutation was rejected or lost. Aborts that job only.
    #[error("playlist '{playlist}' mutation failed: {reason}")]
    PlaylistMutation { playlist: String, reason: String },

    /// A named playlist or section does not exist on the server.
    #[error("not found: {0}")]
    NotFound(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

// ============================================================================
// Backend contract
// ============================================================================

/// One selectable library section on the server. Names are not unique
/// (two sections may both be called "Music"); the id is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibrarySection {
    pub id: String,
    pub title: String,
}

/// Operations the reconciliation run needs from the media server. Every
/// call is fallible; the server enforces no ordering on added tracks.
pub trait MediaBackend: Sync {
    /// Enumerate the music library sections available to the operator.
    fn sections(&self) -> Result<Vec<LibrarySection>, BackendError>;

    /// Enumerate every track of one section. Called once per run to build
    /// the candidate index.
    fn section_tracks(&self, section: &LibrarySection) -> Result<Vec<CandidateTrack>, BackendError>;

    /// Current track ids of a playlist, for add-if-absent deduplication.
    fn playlist_track_ids(&self, playlist_name: &str) -> Result<Vec<TrackId>, BackendError>;

    /// Append tracks to a playlist in one batch.
    fn add_to_playlist(&self, playlist_name: &str, tracks: &[TrackId]) -> Result<(), BackendError>;
}
