//! In-memory candidate index over one library section.
//!
//! Built once per run from the backend, then shared read-only across all
//! job workers. Retrieval here is deliberately broad (substring match on
//! normalized text); ranking precision is the scorer's job, which lets the
//! matcher loosen the query and retry without touching scoring logic.

use crate::backend::{BackendError, LibrarySection, MediaBackend};
use crate::models::{CandidateTrack, TrackQuery};
use crate::normalize::{normalize_artist, normalize_title};

/// Searchable view over a track catalog. The in-memory index never fails,
/// but implementations proxying a remote catalog may; the matcher owns the
/// retry policy for those.
pub trait TrackSearch {
    fn search(&self, query: &TrackQuery, limit: usize) -> Result<Vec<CandidateTrack>, BackendError>;
}

struct IndexEntry {
    track: CandidateTrack,
    title_norm: String,
    artist_norm: String,
}

/// Materialized snapshot of one library section's tracks with precomputed
/// normalized text. Discarded at the end of the run; never persisted.
pub struct CandidateIndex {
    entries: Vec<IndexEntry>,
}

impl CandidateIndex {
    /// Enumerate every track in `section` and materialize it once.
    /// Any enumeration failure is fatal to the run.
    pub fn build(
        backend: &dyn MediaBackend,
        section: &LibrarySection,
    ) -> Result<Self, BackendError> {
        let tracks = backend.section_tracks(section).map_err(|e| {
            BackendError::LibraryUnavailable(format!(
                "cannot enumerate section '{}': {e}",
                section.title
            ))
        })?;
        Ok(Self::from_tracks(tracks))
    }

    /// Build directly from tracks; used by tests and by backends that
    /// already hold the catalog.
    pub fn from_tracks(tracks: Vec<CandidateTrack>) -> Self {
        let entries = tracks
            .into_iter()
            .map(|track| IndexEntry {
                title_norm: normalize_title(&track.title),
                artist_norm: normalize_artist(&track.artist),
                track,
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

impl TrackSearch for CandidateIndex {
    /// Best-effort textual lookup: normalized substring match on title,
    /// narrowed by artist when the query has one. Returns at most `limit`
    /// candidates in catalog order; an empty result is valid.
    fn search(&self, query: &TrackQuery, limit: usize) -> Result<Vec<CandidateTrack>, BackendError> {
        let title_q = normalize_title(&query.title);
        let artist_q = normalize_artist(&query.artist);

        let hits = self
            .entries
            .iter()
            .filter(|e| contains_either(&e.title_norm, &title_q))
            .filter(|e| artist_q.is_empty() || contains_either(&e.artist_norm, &artist_q))
            .take(limit)
            .map(|e| e.track.clone())
            .collect();
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackId;

    fn track(id: &str, title: &str, artist: &str) -> CandidateTrack {
        CandidateTrack {
            id: TrackId(id.into()),
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration_ms: None,
        }
    }

    fn sample_index() -> CandidateIndex {
        CandidateIndex::from_tracks(vec![
            track("1", "Yesterday", "The Beatles"),
            track("2", "Yesterday", "Boyz II Men"),
            track("3", "Yesterday Once More", "Carpenters"),
            track("4", "Let It Be", "The Beatles"),
        ])
    }

    #[test]
    fn search_filters_by_artist_when_present() {
        let index = sample_index();
        let q = TrackQuery::new("Yesterday", "The Beatles");
        let hits = index.search(&q, 50).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, TrackId("1".into()));
    }

    #[test]
    fn search_without_artist_has_broader_recall() {
        let index = sample_index();
        let q = TrackQuery::new("Yesterday", "");
        let hits = index.search(&q, 50).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn search_respects_limit() {
        let index = sample_index();
        let q = TrackQuery::new("Yesterday", "");
        let hits = index.search(&q, 2).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn search_is_diacritic_insensitive() {
        let index = CandidateIndex::from_tracks(vec![track("9", "Jóga", "Björk")]);
        let q = TrackQuery::new("Joga", "Bjork");
        let hits = index.search(&q, 50).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn empty_result_is_not_an_error() {
        let index = sample_index();
        let q = TrackQuery::new("Purple Rain", "Prince");
        let hits = index.search(&q, 50).unwrap();
        assert!(hits.is_empty());
    }
}
