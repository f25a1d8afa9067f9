//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! Listing pages disallowed for the crawler's product token are never fetched.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::ParsedRobots;

use crate::url::robots_url;
use reqwest::Client;
use url::Url;

/// Fetches robots.txt for the origin of `url`
///
/// A single attempt is made. Anything other than a successful response (missing
/// file, server error, timeout) yields allow-all rules.
///
/// # Arguments
///
/// * `client` - The HTTP client to use (carries the crawler's User-Agent)
/// * `url` - Any URL on the origin whose rules are wanted
pub async fn fetch_robots(client: &Client, url: &Url) -> ParsedRobots {
    let Some(robots_url) = robots_url(url) else {
        return ParsedRobots::allow_all();
    };

    tracing::debug!("Fetching {}", robots_url);
    let response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}, allowing all", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::debug!("{} returned {}, allowing all", robots_url, status);
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}, allowing all", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
