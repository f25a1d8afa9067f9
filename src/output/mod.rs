//! Output module for persisting crawl results
//!
//! This module handles:
//! - Writing the deduplicated image URLs to the result file
//! - Optionally downloading the image bytes
//! - Formatting the end-of-crawl summary

mod download;
mod summary;
mod writer;

pub use download::{download_images, file_name_for, DownloadSummary};
pub use summary::{format_report, print_report, CrawlReport};
pub use writer::{write_lines, write_results};
