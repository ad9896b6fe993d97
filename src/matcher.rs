//! Matcher: searches the candidate index, ranks candidates, and applies
//! the three-way decision policy (auto-accept / ask-human / reject).
//!
//! Transient search failures are retried here with exponential backoff and
//! jitter and never surface past this module; an exhausted retry budget
//! resolves the query to `NotFound` with the failure recorded in the
//! reason, which keeps a flaky backend from killing the whole run.

use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::index::TrackSearch;
use crate::models::{MatchDecision, ScoredCandidate, TrackQuery};
use crate::scoring::{score, ScoreWeights};

// ============================================================================
// Configuration
// ============================================================================

/// Backoff schedule for transient search failures.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_ms: u64,
    pub factor: f64,
    /// Fractional jitter applied to every delay, e.g. 0.2 for ±20%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_ms: 1_000,
            factor: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_ms as f64 * self.factor.powi(attempt as i32);
        let jittered = if self.jitter > 0.0 {
            base * (1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter))
        } else {
            base
        };
        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// Tunables of the decision policy. The defaults are design defaults, not
/// recovered constants; all of them can be overridden from the config file.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Top score at or above this may be accepted automatically.
    pub accept_threshold: f64,
    /// Top score at or above this (but not auto-accepted) asks a human.
    pub ask_threshold: f64,
    /// Minimum gap between the top two scores for an automatic accept.
    /// Prevents auto-accepting near-ties, common with duplicate titles by
    /// different artists.
    pub accept_margin: f64,
    /// Candidates surfaced to the confirmation collaborator.
    pub ambiguous_limit: usize,
    /// Candidates requested from the index per search.
    pub search_limit: usize,
    pub retry: RetryPolicy,
    pub weights: ScoreWeights,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.85,
            ask_threshold: 0.55,
            accept_margin: 0.10,
            ambiguous_limit: 5,
            search_limit: 50,
            retry: RetryPolicy::default(),
            weights: ScoreWeights::default(),
        }
    }
}

// ============================================================================
// Matcher
// ============================================================================

pub struct Matcher<'a, S: TrackSearch> {
    search: &'a S,
    config: MatchConfig,
}

impl<'a, S: TrackSearch> Matcher<'a, S> {
    pub fn new(search: &'a S, config: MatchConfig) -> Self {
        Self { search, config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Find the best decision for one query.
    ///
    /// The primary search is retried on transient errors; a successful but
    /// empty primary result earns exactly one loosened retry (title only,
    /// artist dropped). The two retry budgets are independent.
    pub fn find_best(&self, query: &TrackQuery) -> MatchDecision {
        let candidates = match self.search_with_retry(query) {
            Ok(hits) if hits.is_empty() && !query.artist.is_empty() => {
                let loosened = TrackQuery::new(query.title.clone(), "");
                log::debug!("no candidates for '{}', retrying title-only", query.label());
                match self.search.search(&loosened, self.config.search_limit) {
                    Ok(hits) => hits,
                    Err(e) => {
                        return MatchDecision::NotFound {
                            reason: format!("search failed: {e}"),
                        }
                    }
                }
            }
            Ok(hits) => hits,
            Err(e) => {
                return MatchDecision::NotFound {
                    reason: format!("search failed: {e}"),
                }
            }
        };

        if candidates.is_empty() {
            return MatchDecision::NotFound {
                reason: "no candidates in library".to_string(),
            };
        }

        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| ScoredCandidate {
                score: score(query, &candidate, &self.config.weights),
                candidate,
            })
            .collect();

        // Score descending; ties broken by shorter id, then title, then id.
        // Arbitrary but deterministic, so reruns reproduce decisions.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.candidate.id.0.len().cmp(&b.candidate.id.0.len()))
                .then_with(|| a.candidate.title.cmp(&b.candidate.title))
                .then_with(|| a.candidate.id.0.cmp(&b.candidate.id.0))
        });

        let top = scored[0].score;
        let margin_ok =
            scored.len() == 1 || top - scored[1].score >= self.config.accept_margin;

        if top >= self.config.accept_threshold && margin_ok {
            MatchDecision::Accepted(scored.remove(0).candidate)
        } else if top >= self.config.ask_threshold {
            scored.truncate(self.config.ambiguous_limit);
            MatchDecision::Ambiguous(scored)
        } else {
            MatchDecision::NotFound {
                reason: format!(
                    "best candidate scored {top:.2}, below ask threshold {:.2}",
                    self.config.ask_threshold
                ),
            }
        }
    }

    fn search_with_retry(
        &self,
        query: &TrackQuery,
    ) -> Result<Vec<crate::models::CandidateTrack>, crate::backend::BackendError> {
        let retry = self.config.retry;
        let mut attempt = 0u32;
        loop {
            match self.search.search(query, self.config.search_limit) {
                Ok(hits) => return Ok(hits),
                Err(e) if e.is_transient() && attempt < retry.max_retries => {
                    let delay = retry.delay(attempt);
                    attempt += 1;
                    log::warn!(
                        "search for '{}' failed ({e}); retry {attempt}/{} in {delay:?}",
                        query.label(),
                        retry.max_retries
                    );
                    thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
