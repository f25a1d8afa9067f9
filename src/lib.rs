//! Catscrape: a polite category-page image scraper
//!
//! This crate walks the paginated listing pages of a storefront category, pulls every
//! image URL it can find (lazy-loaded and responsive variants included), deduplicates
//! them across the whole crawl and writes the result to disk.

pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Catscrape operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Filesystem error at {path}: {source}")]
    FileSystem {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid crawl phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },
}

/// Why a single page (or image) could not be fetched
///
/// These are recorded per page and never abort the crawl on their own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchErrorKind {
    #[error("request timed out")]
    NetworkTimeout,

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("HTTP client error {0}")]
    HttpClientError(u16),

    #[error("HTTP server error {0}")]
    HttpServerError(u16),

    #[error("parse error: {0}")]
    ParseError(String),
}

impl FetchErrorKind {
    /// Returns true if another attempt may succeed
    ///
    /// Timeouts, connection failures, 5xx and 429 are retried. Every other
    /// client error and all parse errors fail immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkTimeout | Self::ConnectionError(_) | Self::HttpServerError(_) => true,
            Self::HttpClientError(status) => *status == 429,
            Self::ParseError(_) => false,
        }
    }

    /// Short stable label used when counting failures
    pub fn label(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network_timeout",
            Self::ConnectionError(_) => "connection_error",
            Self::HttpClientError(_) => "http_client_error",
            Self::HttpServerError(_) => "http_server_error",
            Self::ParseError(_) => "parse_error",
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Catscrape operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, RetryPolicy};
pub use crawler::{Coordinator, StopHandle};
pub use output::CrawlReport;
pub use state::{CanonicalUrlSet, CrawlPhase};
pub use crate::url::{canonicalize, resolve_url};
