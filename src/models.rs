//! Core data models for playlist reconciliation.
//!
//! This module contains the struct definitions and enums shared by the
//! index, matcher, and driver.

use serde::Serialize;

// ============================================================================
// Queries
// ============================================================================

/// One missing track extracted from an input CSV row.
/// Immutable once parsed; `title` is guaranteed non-empty, `artist` may be
/// empty (which lowers the achievable match confidence).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackQuery {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
}

impl TrackQuery {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: None,
        }
    }

    /// Compact display form for prompts and logs.
    pub fn label(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }
}

// ============================================================================
// Library candidates
// ============================================================================

/// Opaque library identifier (Plex rating key or similar).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub String);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A library track considered as a possible match for a query.
/// Owned by the candidate index; read-only everywhere else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateTrack {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_ms: Option<i64>,
}

/// A candidate with its similarity score, produced per query.
#[derive(Clone, Debug)]
pub struct ScoredCandidate {
    pub candidate: CandidateTrack,
    pub score: f64,
}

// ============================================================================
// Decisions
// ============================================================================

/// Terminal outcome of matching one query against the index.
#[derive(Clone, Debug)]
pub enum MatchDecision {
    /// Confident enough to act on automatically.
    Accepted(CandidateTrack),
    /// Plausible candidates found but none clearly wins; ordered best-first,
    /// capped at the configured limit.
    Ambiguous(Vec<ScoredCandidate>),
    /// Nothing usable; `reason` records why (exhausted retries, no
    /// candidates, all below threshold) for the final report.
    NotFound { reason: String },
}

// ============================================================================
// Jobs and results
// ============================================================================

/// One reconciliation unit: a playlist plus the missing tracks requested
/// for it. Derived from a single CSV file; independent of other jobs.
#[derive(Clone, Debug)]
pub struct PlaylistJob {
    pub playlist_name: String,
    pub queries: Vec<TrackQuery>,
}

/// Per-job outcome. `added`, `skipped`, and `failed` are pairwise disjoint
/// and together cover the job's queries exactly once.
#[derive(Clone, Debug, Default)]
pub struct ReconciliationResult {
    pub playlist_name: String,
    pub added: Vec<CandidateTrack>,
    pub skipped: Vec<(TrackQuery, String)>,
    pub failed: Vec<(TrackQuery, String)>,
}

impl ReconciliationResult {
    pub fn new(playlist_name: impl Into<String>) -> Self {
        Self {
            playlist_name: playlist_name.into(),
            ..Default::default()
        }
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.skipped.len() + self.failed.len()
    }
}

// ============================================================================
// Run statistics
// ============================================================================

/// Aggregate counters for the whole run, logged as JSON at the end.
#[derive(Default, Debug, Clone, Serialize)]
pub struct RunStats {
    pub jobs: usize,
    pub queries: usize,
    pub auto_accepted: usize,
    pub confirmed: usize,
    pub declined: usize,
    pub not_found: usize,
    pub search_errors: usize,
    pub added: usize,
    pub already_present: usize,
    pub mutation_failures: usize,
    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Accepted matches (automatic plus human-confirmed) as a percentage
    /// of all queries.
    pub fn match_rate(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            100.0 * (self.auto_accepted + self.confirmed) as f64 / self.queries as f64
        }
    }

    pub fn log_summary(&self) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            log::info!("run summary:\n{json}");
        }
    }
}
