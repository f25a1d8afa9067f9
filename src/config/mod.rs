//! Configuration module for Catscrape
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every field has a default, so a crawl can also be configured purely from the
//! command line.
//!
//! # Example
//!
//! ```no_run
//! use catscrape::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("catscrape.toml")).unwrap();
//! println!("Crawler will visit at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig, RetryPolicy, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, read_config, read_config_with_hash};
pub use validation::validate;
