//! Similarity scoring between a track query and a library candidate.
//!
//! Pure and deterministic: identical inputs always produce identical
//! scores, so decisions are reproducible in tests. Retrieval recall is the
//! index's job; this module only ranks.

use serde::Deserialize;

use crate::models::{CandidateTrack, TrackQuery};
use crate::normalize::{normalize_album, normalize_artist, normalize_title, sorted_tokens};

// ============================================================================
// Weights
// ============================================================================

/// Field weights for the combined score. Defaults follow the matching
/// design: title dominates, artist disambiguates, album only ever helps.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub title: f64,
    pub artist: f64,
    /// Maximum bonus contributed by an album match; never a penalty.
    pub album_bonus: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            title: 0.7,
            artist: 0.3,
            album_bonus: 0.05,
        }
    }
}

// ============================================================================
// String similarity
// ============================================================================

/// Token-sort ratio over already-normalized strings: tokenize, sort, rejoin,
/// then normalized Levenshtein. Insensitive to word order, so
/// "Quick Brown Fox, The" matches "The Quick Brown Fox".
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let a = sorted_tokens(a).join(" ");
    let b = sorted_tokens(b).join(" ");
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

// ============================================================================
// Combined score
// ============================================================================

/// Score a candidate against a query, in [0, 1].
///
/// Title and artist similarities are combined as a weighted sum; when the
/// query has no artist the title carries full weight. A matching album adds
/// a small bonus but never lowers the score; the result is clamped to 1.0.
pub fn score(query: &TrackQuery, candidate: &CandidateTrack, weights: &ScoreWeights) -> f64 {
    let title_sim = token_sort_ratio(
        &normalize_title(&query.title),
        &normalize_title(&candidate.title),
    );

    let base = if query.artist.is_empty() {
        title_sim
    } else {
        let artist_sim = token_sort_ratio(
            &normalize_artist(&query.artist),
            &normalize_artist(&candidate.artist),
        );
        weights.title * title_sim + weights.artist * artist_sim
    };

    let album_bonus = match (&query.album, &candidate.album) {
        (Some(qa), Some(ca)) => {
            weights.album_bonus * token_sort_ratio(&normalize_album(qa), &normalize_album(ca))
        }
        _ => 0.0,
    };

    (base + album_bonus).min(1.0)
}

// ============================================================================
// TESTS
// ============================================================================
