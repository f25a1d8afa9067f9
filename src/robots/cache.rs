//! Per-origin robots.txt cache
//!
//! Each origin's robots.txt is fetched at most once per crawl.

use crate::robots::{fetch_robots, ParsedRobots};
use crate::url::origin_key;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Robots rules keyed by origin (`scheme://host[:port]`)
#[derive(Debug, Clone)]
pub struct RobotsCache {
    /// Token matched against `User-agent` lines
    product_token: String,
    entries: HashMap<String, ParsedRobots>,
}

impl RobotsCache {
    pub fn new(product_token: impl Into<String>) -> Self {
        Self {
            product_token: product_token.into(),
            entries: HashMap::new(),
        }
    }

    /// Makes sure the rules for `url`'s origin are loaded, fetching them if needed
    ///
    /// # Returns
    ///
    /// `true` if this call fetched robots.txt, `false` if it was already cached
    pub async fn ensure_loaded(&mut self, client: &Client, url: &Url) -> bool {
        let Some(origin) = origin_key(url) else {
            return false;
        };
        if self.entries.contains_key(&origin) {
            return false;
        }

        let robots = fetch_robots(client, url).await;
        self.entries.insert(origin, robots);
        true
    }

    /// Stores rules for an origin, replacing any cached entry
    pub fn insert(&mut self, origin: impl Into<String>, robots: ParsedRobots) {
        self.entries.insert(origin.into(), robots);
    }

    /// Returns the cached rules for `url`'s origin
    pub fn get(&self, url: &Url) -> Option<&ParsedRobots> {
        origin_key(url).and_then(|origin| self.entries.get(&origin))
    }

    /// Checks a URL against its origin's rules
    ///
    /// Origins that were never loaded are allowed.
    pub fn is_allowed(&self, url: &Url) -> bool {
        self.get(url)
            .map_or(true, |robots| robots.is_allowed(url, &self.product_token))
    }

    /// Crawl-delay declared for `url`'s origin
    pub fn crawl_delay(&self, url: &Url) -> Option<Duration> {
        self.get(url)
            .and_then(|robots| robots.crawl_delay(&self.product_token))
    }

    /// Largest crawl-delay across every cached origin
    pub fn max_crawl_delay(&self) -> Option<Duration> {
        self.entries
            .values()
            .filter_map(|robots| robots.crawl_delay(&self.product_token))
            .max()
    }

    pub fn product_token(&self) -> &str {
        &self.product_token
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
