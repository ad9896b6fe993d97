//! Reconciliation driver: runs playlist jobs against the shared candidate
//! index and issues one idempotent playlist mutation per job.
//!
//! Jobs are independent: they only read the immutable index and write to
//! their own playlist, so they run in parallel on the rayon pool. A failure
//! inside one job never aborts its siblings.

use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::backend::MediaBackend;
use crate::confirm::Confirm;
use crate::index::TrackSearch;
use crate::matcher::Matcher;
use crate::models::{
    CandidateTrack, MatchDecision, PlaylistJob, ReconciliationResult, RunStats, TrackId,
    TrackQuery,
};

#[derive(Default)]
struct JobCounts {
    auto_accepted: usize,
    confirmed: usize,
    declined: usize,
    not_found: usize,
    search_errors: usize,
    already_present: usize,
    mutation_failed: bool,
}

pub struct Driver<'a, S: TrackSearch + Sync> {
    matcher: Matcher<'a, S>,
    backend: &'a dyn MediaBackend,
    confirm: &'a dyn Confirm,
}

impl<'a, S: TrackSearch + Sync> Driver<'a, S> {
    pub fn new(
        matcher: Matcher<'a, S>,
        backend: &'a dyn MediaBackend,
        confirm: &'a dyn Confirm,
    ) -> Self {
        Self {
            matcher,
            backend,
            confirm,
        }
    }

    /// Run every job and return per-job results (in input order) plus the
    /// aggregate run statistics.
    pub fn run(&self, jobs: &[PlaylistJob]) -> (Vec<ReconciliationResult>, RunStats) {
        let start = Instant::now();

        let bar = crate::progress::job_bar(jobs.len() as u64, "Reconciling playlists");
        let outcomes: Vec<(ReconciliationResult, JobCounts)> = jobs
            .par_iter()
            .map(|job| {
                let outcome = self.run_job(job);
                bar.inc(1);
                outcome
            })
            .collect();
        bar.finish_and_clear();

        let mut stats = RunStats {
            jobs: jobs.len(),
            ..Default::default()
        };
        let mut results = Vec::with_capacity(outcomes.len());
        for (result, counts) in outcomes {
            stats.queries += result.total();
            stats.auto_accepted += counts.auto_accepted;
            stats.confirmed += counts.confirmed;
            stats.declined += counts.declined;
            stats.not_found += counts.not_found;
            stats.search_errors += counts.search_errors;
            stats.already_present += counts.already_present;
            stats.added += result.added.len();
            if counts.mutation_failed {
                stats.mutation_failures += 1;
            }
            results.push(result);
        }
        stats.elapsed_seconds = start.elapsed().as_secs_f64();

        (results, stats)
    }

    fn run_job(&self, job: &PlaylistJob) -> (ReconciliationResult, JobCounts) {
        let mut result = ReconciliationResult::new(&job.playlist_name);
        let mut counts = JobCounts::default();
        let mut accepted: Vec<(TrackQuery, CandidateTrack)> = Vec::new();

        for query in &job.queries {
            match self.matcher.find_best(query) {
                MatchDecision::Accepted(candidate) => {
                    log::debug!(
                        "'{}': accepted {} ({})",
                        job.playlist_name,
                        query.label(),
                        candidate.id
                    );
                    counts.auto_accepted += 1;
                    accepted.push((query.clone(), candidate));
                }
                MatchDecision::Ambiguous(candidates) => {
                    match self.confirm.confirm(query, &candidates) {
                        Some(candidate) => {
                            counts.confirmed += 1;
                            accepted.push((query.clone(), candidate));
                        }
                        None => {
                            counts.declined += 1;
                            result
                                .skipped
                                .push((query.clone(), "ambiguous match declined".to_string()));
                        }
                    }
                }
                MatchDecision::NotFound { reason } => {
                    if reason.starts_with("search failed") {
                        counts.search_errors += 1;
                    } else {
                        counts.not_found += 1;
                    }
                    log::info!("'{}': no match for {}: {reason}", job.playlist_name, query.label());
                    result.skipped.push((query.clone(), reason));
                }
            }
        }

        if !accepted.is_empty() {
            self.mutate_playlist(&job.playlist_name, accepted, &mut result, &mut counts);
        }

        (result, counts)
    }

    /// Apply the job's accepted tracks as one batched, add-if-absent
    /// mutation. Tracks already in the playlist (or queued twice within
    /// the batch) are reported as skipped, keeping reruns idempotent.
    fn mutate_playlist(
        &self,
        playlist_name: &str,
        accepted: Vec<(TrackQuery, CandidateTrack)>,
        result: &mut ReconciliationResult,
        counts: &mut JobCounts,
    ) {
        let existing: FxHashSet<TrackId> = match self.backend.playlist_track_ids(playlist_name) {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                log::error!("'{playlist_name}': cannot read playlist contents: {e}");
                counts.mutation_failed = true;
                for (query, _) in accepted {
                    result
                        .failed
                        .push((query, format!("cannot read playlist contents: {e}")));
                }
                return;
            }
        };

        let mut seen = existing;
        let mut batch: Vec<TrackId> = Vec::new();
        let mut pending: Vec<(TrackQuery, CandidateTrack)> = Vec::new();
        for (query, candidate) in accepted {
            if seen.contains(&candidate.id) {
                counts.already_present += 1;
                result
                    .skipped
                    .push((query, "already in playlist".to_string()));
            } else {
                seen.insert(candidate.id.clone());
                batch.push(candidate.id.clone());
                pending.push((query, candidate));
            }
        }

        if batch.is_empty() {
            return;
        }

        match self.backend.add_to_playlist(playlist_name, &batch) {
            Ok(()) => {
                log::info!("'{playlist_name}': added {} track(s)", batch.len());
                result
                    .added
                    .extend(pending.into_iter().map(|(_, candidate)| candidate));
            }
            Err(e) => {
                log::error!("'{playlist_name}': playlist mutation failed: {e}");
                counts.mutation_failed = true;
                for (query, _) in pending {
                    result
                        .failed
                        .push((query, format!("playlist mutation failed: {e}")));
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, LibrarySection};
    use crate::confirm::DeclineAll;
    use crate::index::CandidateIndex;
    use crate::matcher::{MatchConfig, RetryPolicy};
    use crate::models::ScoredCandidate;
    use std::sync::Mutex;

    fn track(id: &str, title: &str, artist: &str) -> CandidateTrack {
        CandidateTrack {
            id: TrackId(id.into()),
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration_ms: None,
        }
    }

    fn fast_config() -> MatchConfig {
        MatchConfig {
            retry: RetryPolicy {
                base_ms: 0,
                jitter: 0.0,
                ..RetryPolicy::default()
            },
            ..MatchConfig::default()
        }
    }

    /// In-memory playlist store. `fail_playlists` simulates per-playlist
    /// mutation failures.
    #[derive(Default)]
    struct FakeBackend {
        playlists: Mutex<std::collections::HashMap<String, Vec<TrackId>>>,
        fail_playlists: Vec<String>,
    }

    impl FakeBackend {
        fn playlist(&self, name: &str) -> Vec<TrackId> {
            self.playlists
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .unwrap_or_default()
        }
    }

    impl MediaBackend for FakeBackend {
        fn sections(&self) -> Result<Vec<LibrarySection>, BackendError> {
            Ok(Vec::new())
        }

        fn section_tracks(
            &self,
            _section: &LibrarySection,
        ) -> Result<Vec<CandidateTrack>, BackendError> {
            Ok(Vec::new())
        }

        fn playlist_track_ids(&self, playlist_name: &str) -> Result<Vec<TrackId>, BackendError> {
            Ok(self.playlist(playlist_name))
        }

        fn add_to_playlist(
            &self,
            playlist_name: &str,
            tracks: &[TrackId],
        ) -> Result<(), BackendError> {
            if self.fail_playlists.iter().any(|p| p == playlist_name) {
                return Err(BackendError::PlaylistMutation {
                    playlist: playlist_name.to_string(),
                    reason: "permission denied".to_string(),
                });
            }
            self.playlists
                .lock()
                .unwrap()
                .entry(playlist_name.to_string())
                .or_default()
                .extend_from_slice(tracks);
            Ok(())
        }
    }

    /// Confirmation stub that always takes the top-ranked candidate.
    struct PickFirst;

    impl Confirm for PickFirst {
        fn confirm(
            &self,
            _query: &TrackQuery,
            candidates: &[ScoredCandidate],
        ) -> Option<CandidateTrack> {
            candidates.first().map(|sc| sc.candidate.clone())
        }
    }

    fn library_index() -> CandidateIndex {
        CandidateIndex::from_tracks(vec![
            track("1", "Yesterday", "The Beatles"),
            track("2", "Yesterday", "Boyz II Men"),
            track("3", "Let It Be", "The Beatles"),
            track("4", "Bohemian Rhapsody", "Queen"),
        ])
    }

    fn job(name: &str, queries: Vec<TrackQuery>) -> PlaylistJob {
        PlaylistJob {
            playlist_name: name.to_string(),
            queries,
        }
    }

    fn assert_partition(result: &ReconciliationResult, job: &PlaylistJob) {
        assert_eq!(
            result.total(),
            job.queries.len(),
            "added + skipped + failed must cover the job's queries exactly once"
        );
    }

    #[test]
    fn confident_matches_are_added_once() {
        let index = library_index();
        let backend = FakeBackend::default();
        let driver = Driver::new(Matcher::new(&index, fast_config()), &backend, &DeclineAll);

        let jobs = vec![job(
            "oldies",
            vec![
                TrackQuery::new("Yesterday", "The Beatles"),
                TrackQuery::new("Let It Be", "The Beatles"),
                TrackQuery::new("Purple Rain", "Prince"),
            ],
        )];
        let (results, stats) = driver.run(&jobs);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].added.len(), 2);
        assert_eq!(results[0].skipped.len(), 1);
        assert!(results[0].failed.is_empty());
        assert_partition(&results[0], &jobs[0]);
        assert_eq!(backend.playlist("oldies").len(), 2);
        assert_eq!(stats.added, 2);
        assert_eq!(stats.auto_accepted, 2);
    }

    #[test]
    fn second_run_adds_nothing() {
        let index = library_index();
        let backend = FakeBackend::default();
        let driver = Driver::new(Matcher::new(&index, fast_config()), &backend, &DeclineAll);

        let jobs = vec![job(
            "oldies",
            vec![
                TrackQuery::new("Yesterday", "The Beatles"),
                TrackQuery::new("Let It Be", "The Beatles"),
            ],
        )];

        let (first, _) = driver.run(&jobs);
        assert_eq!(first[0].added.len(), 2);

        let (second, stats) = driver.run(&jobs);
        assert_eq!(second[0].added.len(), 0, "rerun must not duplicate entries");
        assert_eq!(stats.already_present, 2);
        assert_partition(&second[0], &jobs[0]);
        assert_eq!(backend.playlist("oldies").len(), 2);
    }

    #[test]
    fn ambiguous_confirmation_queues_the_selection() {
        let index = library_index();
        let backend = FakeBackend::default();
        let driver = Driver::new(Matcher::new(&index, fast_config()), &backend, &PickFirst);

        // Empty artist: both "Yesterday" tracks tie, needs confirmation.
        let jobs = vec![job("mixtape", vec![TrackQuery::new("Yesterday", "")])];
        let (results, stats) = driver.run(&jobs);

        assert_eq!(results[0].added.len(), 1);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(backend.playlist("mixtape").len(), 1);
    }

    #[test]
    fn ambiguous_decline_is_skipped() {
        let index = library_index();
        let backend = FakeBackend::default();
        let driver = Driver::new(Matcher::new(&index, fast_config()), &backend, &DeclineAll);

        let jobs = vec![job("mixtape", vec![TrackQuery::new("Yesterday", "")])];
        let (results, stats) = driver.run(&jobs);

        assert!(results[0].added.is_empty());
        assert_eq!(results[0].skipped.len(), 1);
        assert_eq!(stats.declined, 1);
        assert!(backend.playlist("mixtape").is_empty());
    }

    #[test]
    fn mutation_failure_is_isolated_to_its_job() {
        let index = library_index();
        let backend = FakeBackend {
            fail_playlists: vec!["broken".to_string()],
            ..Default::default()
        };
        let driver = Driver::new(Matcher::new(&index, fast_config()), &backend, &DeclineAll);

        let jobs = vec![
            job("broken", vec![TrackQuery::new("Yesterday", "The Beatles")]),
            job("healthy", vec![TrackQuery::new("Let It Be", "The Beatles")]),
        ];
        let (results, stats) = driver.run(&jobs);

        assert!(results[0].added.is_empty());
        assert_eq!(results[0].failed.len(), 1);
        assert_partition(&results[0], &jobs[0]);

        assert_eq!(results[1].added.len(), 1);
        assert!(results[1].failed.is_empty());
        assert_eq!(backend.playlist("healthy").len(), 1);
        assert_eq!(stats.mutation_failures, 1);
    }

    #[test]
    fn duplicate_accepts_within_a_job_are_deduped() {
        let index = library_index();
        let backend = FakeBackend::default();
        let driver = Driver::new(Matcher::new(&index, fast_config()), &backend, &DeclineAll);

        let jobs = vec![job(
            "oldies",
            vec![
                TrackQuery::new("Yesterday", "The Beatles"),
                TrackQuery::new("Yesterday", "The Beatles"),
            ],
        )];
        let (results, _) = driver.run(&jobs);

        assert_eq!(results[0].added.len(), 1);
        assert_eq!(results[0].skipped.len(), 1);
        assert_partition(&results[0], &jobs[0]);
        assert_eq!(backend.playlist("oldies").len(), 1);
    }
}
