//! Mutable state of one crawl run
//!
//! A `CrawlState` is owned by the coordinator loop and is never shared between tasks.
//! Workers hand their outcomes back to the loop, which applies them here.

use crate::crawler::ImageCandidate;
use crate::state::{CanonicalUrlSet, CrawlPhase};
use crate::url::canonicalize;
use crate::{FetchErrorKind, ScrapeError};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Page counters reported in the crawl summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCounters {
    /// Pages handed to the scheduler
    pub enqueued: u32,
    /// Pages fetched and parsed successfully
    pub succeeded: u32,
    /// Pages that failed after all attempts
    pub failed: u32,
    /// Pages skipped because robots.txt disallows them
    pub disallowed: u32,
    /// Pages dropped by a stop request or the deadline
    pub abandoned: u32,
    /// Total fetch attempts across all pages
    pub attempts: u32,
    /// Image candidates seen before deduplication
    pub candidates: u64,
}

/// Tracks phase, visited pages, results and counters for a crawl
#[derive(Debug)]
pub struct CrawlState {
    phase: CrawlPhase,
    /// Canonical keys of every page admitted so far
    visited: HashSet<String>,
    results: CanonicalUrlSet,
    counters: PageCounters,
    /// Seed chains whose first page was fetched successfully
    seeds_established: usize,
    /// Failure counts by error label
    failures: BTreeMap<String, u32>,
    started_at: DateTime<Utc>,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlState {
    pub fn new() -> Self {
        Self {
            phase: CrawlPhase::Idle,
            visited: HashSet::new(),
            results: CanonicalUrlSet::new(),
            counters: PageCounters::default(),
            seeds_established: 0,
            failures: BTreeMap::new(),
            started_at: Utc::now(),
        }
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Moves the crawl to a new phase
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The transition is allowed and was applied
    /// * `Err(ScrapeError::InvalidTransition)` - The transition is not allowed; the phase is unchanged
    pub fn transition(&mut self, to: CrawlPhase) -> Result<(), ScrapeError> {
        if !self.phase.can_transition_to(to) {
            return Err(ScrapeError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::debug!("Crawl phase {} -> {}", self.phase, to);
        self.phase = to;
        Ok(())
    }

    /// Records a page as visited
    ///
    /// Returns false if an equivalent URL was already visited.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(canonicalize(url))
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(&canonicalize(url))
    }

    /// Canonical keys of all visited pages
    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    pub fn pages_visited(&self) -> usize {
        self.visited.len()
    }

    /// Folds a page's candidates into the result set, returning how many were new
    pub fn fold_candidates(&mut self, candidates: &[ImageCandidate]) -> usize {
        self.counters.candidates += candidates.len() as u64;
        self.results.fold_all(candidates)
    }

    pub fn results(&self) -> &CanonicalUrlSet {
        &self.results
    }

    pub fn record_enqueued(&mut self) {
        self.counters.enqueued += 1;
    }

    pub fn record_success(&mut self, is_seed: bool, attempts: u32) {
        self.counters.succeeded += 1;
        self.counters.attempts += attempts;
        if is_seed {
            self.seeds_established += 1;
        }
    }

    pub fn record_failure(&mut self, kind: &FetchErrorKind, attempts: u32) {
        self.counters.failed += 1;
        self.counters.attempts += attempts;
        *self.failures.entry(kind.label().to_string()).or_insert(0) += 1;
    }

    pub fn record_disallowed(&mut self) {
        self.counters.disallowed += 1;
    }

    pub fn record_abandoned(&mut self, count: usize) {
        self.counters.abandoned += count as u32;
    }

    pub fn counters(&self) -> PageCounters {
        self.counters
    }

    /// Returns true once at least one seed page has been fetched
    pub fn any_seed_established(&self) -> bool {
        self.seeds_established > 0
    }

    pub fn seeds_established(&self) -> usize {
        self.seeds_established
    }

    pub fn failures(&self) -> &BTreeMap<String, u32> {
        &self.failures
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Consumes the state, returning the result set and failure breakdown
    pub fn into_parts(self) -> (CanonicalUrlSet, PageCounters, BTreeMap<String, u32>) {
        (self.results, self.counters, self.failures)
    }
}
