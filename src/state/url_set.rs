//! The running set of unique image URLs for one crawl

use crate::crawler::ImageCandidate;
use crate::url::canonicalize;
use std::collections::HashSet;
use url::Url;

/// Unique image URLs keyed by canonical form
///
/// No two members share a canonical key. Members keep the order in which they were
/// first folded in, which is the order the result file uses.
#[derive(Debug, Clone, Default)]
pub struct CanonicalUrlSet {
    keys: HashSet<String>,
    urls: Vec<Url>,
}

impl CanonicalUrlSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one candidate into the set
    ///
    /// # Returns
    ///
    /// * `true` - The candidate's canonical key was new and it was inserted
    /// * `false` - An equivalent URL was already present; nothing changed
    pub fn fold(&mut self, candidate: &ImageCandidate) -> bool {
        self.insert(&candidate.resolved_url)
    }

    /// Folds every candidate of a page, returning how many were new
    pub fn fold_all<'a>(&mut self, candidates: impl IntoIterator<Item = &'a ImageCandidate>) -> usize {
        candidates
            .into_iter()
            .filter(|candidate| self.fold(candidate))
            .count()
    }

    /// Inserts a URL if its canonical key is absent
    pub fn insert(&mut self, url: &Url) -> bool {
        if self.keys.insert(canonicalize(url)) {
            self.urls.push(url.clone());
            true
        } else {
            false
        }
    }

    /// Returns true if an equivalent URL is already present
    pub fn contains(&self, url: &Url) -> bool {
        self.keys.contains(&canonicalize(url))
    }

    /// Iterates members in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.urls.iter()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
