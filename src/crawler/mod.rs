//! Crawler module for category page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - Image extraction from listing markup
//! - Pagination discovery
//! - Request scheduling and concurrency limiting
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod pagination;
mod scheduler;

pub use coordinator::{Coordinator, StopHandle};
pub use extractor::{extract_from_document, extract_images, pick_srcset_entry, CandidateKind, ImageCandidate};
pub use fetcher::{
    backoff_delay, build_http_client, fetch_bytes, fetch_page, with_jitter, with_retry, FetchedPage,
    PageRequest, PageResult,
};
pub use pagination::{discover_next, next_page, reject_cycle, NextPage, NextSource};
pub use scheduler::Scheduler;

use crate::config::Config;
use crate::output::CrawlReport;
use crate::ScrapeError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration and build the HTTP client
/// 2. Load robots.txt for the seed origins
/// 3. Walk every seed's pagination chain with bounded concurrency
/// 4. Deduplicate the collected image URLs
/// 5. Write the result file
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The crawl finished (possibly aborted) and results were written
/// * `Err(ScrapeError)` - The crawl could not start or the results could not be written
///
/// # Example
///
/// ```no_run
/// use catscrape::config::load_config;
/// use catscrape::crawler::crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("catscrape.toml"))?;
/// let report = crawl(config).await?;
/// println!("{} images", report.unique_images);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: Config) -> Result<CrawlReport, ScrapeError> {
    Coordinator::new(config)?.run().await
}
