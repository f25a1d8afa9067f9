//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: The crawl lifecycle (idle, paginating, draining, done, aborted)
//! - `CanonicalUrlSet`: Unique image URLs keyed by canonical form, in discovery order
//! - `CrawlState`: Visited pages, results and counters owned by the coordinator

mod crawl_state;
mod phase;
mod url_set;

// Re-export main types
pub use crawl_state::{CrawlState, PageCounters};
pub use phase::CrawlPhase;
pub use url_set::CanonicalUrlSet;
