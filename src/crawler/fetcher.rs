//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent and encoding headers
//! - GET requests for listing pages and image bytes
//! - Retry with exponential backoff and jitter for transient failures
//! - Error classification

use crate::config::{RetryPolicy, UserAgentConfig};
use crate::FetchErrorKind;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Fraction of the computed delay used as the jitter range (±20%)
const JITTER_FRACTION: f64 = 0.2;

/// A page waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// The page URL
    pub url: Url,
    /// Zero-based position of the page in its pagination chain
    pub page_index: u32,
    /// Attempts made for this request, filled in by [`fetch_page`]
    pub attempt: u32,
    /// Which seed this page's chain started from
    pub seed_index: usize,
}

impl PageRequest {
    /// Creates the first request of a pagination chain
    pub fn seed(url: Url, seed_index: usize) -> Self {
        Self {
            url,
            page_index: 0,
            attempt: 0,
            seed_index,
        }
    }

    /// Creates the follow-up request for the next page of the same chain
    pub fn next(&self, url: Url, page_index: u32) -> Self {
        Self {
            url,
            page_index,
            attempt: 0,
            seed_index: self.seed_index,
        }
    }

    /// Returns true if this is the first page of its chain
    pub fn is_seed(&self) -> bool {
        self.page_index == 0
    }
}

/// A successfully fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// Page body content
    pub html: String,
}

/// Outcome of fetching one page, after all retries
#[derive(Debug)]
pub struct PageResult {
    pub request: PageRequest,
    /// Number of attempts actually made
    pub attempts: u32,
    pub outcome: Result<FetchedPage, FetchErrorKind>,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Hard per-attempt timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use catscrape::config::UserAgentConfig;
/// use catscrape::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(15)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    Client::builder()
        .user_agent(config.header_value())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Computes the un-jittered delay before retry number `attempt + 1`
///
/// `min(base_delay_ms * backoff_factor ^ attempt, max_delay_ms)`
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.min(32) as i32;
    let delay_ms = policy.base_delay_ms as f64 * policy.backoff_factor.powi(exponent);
    let capped = delay_ms.min(policy.max_delay_ms as f64);
    Duration::from_millis(capped.max(0.0) as u64)
}

/// Adds ±20% random jitter to a delay
pub fn with_jitter(delay: Duration) -> Duration {
    let millis = delay.as_millis() as f64;
    let spread = millis * JITTER_FRACTION;
    if spread < 1.0 {
        return delay;
    }
    let offset = rand::thread_rng().gen_range(-spread..=spread);
    Duration::from_millis((millis + offset).max(0.0) as u64)
}

/// Runs `operation` until it succeeds, fails permanently, or runs out of attempts
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Timeout | Retry with backoff |
/// | Connection error | Retry with backoff |
/// | HTTP 5xx | Retry with backoff |
/// | HTTP 429 | Retry with backoff |
/// | Other HTTP 4xx | Fail immediately |
/// | Parse / content mismatch | Fail immediately |
///
/// # Returns
///
/// The final result and the number of attempts made (never more than
/// `policy.max_attempts`).
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    url: &Url,
    mut operation: F,
) -> (Result<T, FetchErrorKind>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchErrorKind>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let result = operation().await;
        attempt += 1;

        match result {
            Ok(value) => return (Ok(value), attempt),
            Err(kind) if kind.is_retryable() && attempt < max_attempts => {
                let delay = with_jitter(backoff_delay(policy, attempt - 1));
                tracing::debug!(
                    "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                    attempt,
                    max_attempts,
                    url,
                    kind,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(kind) => return (Err(kind), attempt),
        }
    }
}

/// Fetches a listing page with full error handling and retry logic
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `request` - The page to fetch
/// * `policy` - Retry and backoff settings
///
/// # Returns
///
/// A PageResult holding the HTML or the terminal error kind
pub async fn fetch_page(client: &Client, mut request: PageRequest, policy: &RetryPolicy) -> PageResult {
    let (outcome, attempts) =
        with_retry(policy, &request.url, || fetch_html_once(client, &request.url)).await;
    request.attempt = attempts;

    PageResult {
        attempts,
        request,
        outcome,
    }
}

/// Fetches raw bytes (an image) with the same retry policy as pages
pub async fn fetch_bytes(
    client: &Client,
    url: &Url,
    policy: &RetryPolicy,
) -> (Result<Vec<u8>, FetchErrorKind>, u32) {
    with_retry(policy, url, || fetch_bytes_once(client, url)).await
}

/// Single GET attempt for an HTML page
async fn fetch_html_once(client: &Client, url: &Url) -> Result<FetchedPage, FetchErrorKind> {
    let response = send(client, url).await?;
    let final_url = response.url().clone();

    // A missing Content-Type is tolerated, anything declared non-HTML is not
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if !content_type.is_empty() && !content_type.contains("html") {
        return Err(FetchErrorKind::ParseError(format!(
            "expected HTML, got {}",
            content_type
        )));
    }

    let html = response.text().await.map_err(classify_error)?;
    Ok(FetchedPage { final_url, html })
}

/// Single GET attempt for raw bytes
async fn fetch_bytes_once(client: &Client, url: &Url) -> Result<Vec<u8>, FetchErrorKind> {
    let response = send(client, url).await?;
    let bytes = response.bytes().await.map_err(classify_error)?;
    Ok(bytes.to_vec())
}

/// Sends the GET request and maps the status code
async fn send(client: &Client, url: &Url) -> Result<Response, FetchErrorKind> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(classify_error)?;

    classify_status(response.status())?;
    Ok(response)
}

/// Maps a non-success status code to an error kind
fn classify_status(status: StatusCode) -> Result<(), FetchErrorKind> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() {
        Err(FetchErrorKind::HttpServerError(status.as_u16()))
    } else {
        // 4xx, and any 3xx left over after the redirect limit
        Err(FetchErrorKind::HttpClientError(status.as_u16()))
    }
}

/// Classifies a transport error
fn classify_error(error: reqwest::Error) -> FetchErrorKind {
    if error.is_timeout() {
        FetchErrorKind::NetworkTimeout
    } else if error.is_decode() {
        FetchErrorKind::ParseError(error.to_string())
    } else if error.is_redirect() {
        // Redirect loops and overlong chains; 310 is the conventional "too many redirects"
        FetchErrorKind::HttpClientError(error.status().map_or(310, |s| s.as_u16()))
    } else {
        FetchErrorKind::ConnectionError(error.to_string())
    }
}
