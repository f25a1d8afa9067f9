use crate::{UrlError, UrlResult};
use url::form_urlencoded;
use url::Url;

/// Query parameters that only carry attribution and never select a different image
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "igshid", "_ga", "_gl",
    "yclid",
];

/// Computes the canonical deduplication key of a URL
///
/// # Canonicalization Steps
///
/// 1. Lowercase the scheme and host
/// 2. Drop the port when it is the scheme's default
/// 3. Remove a trailing slash from the path (except for root /)
/// 4. Remove tracking query parameters
/// 5. Sort remaining query parameters by key, then value
/// 6. Drop user info and fragment
///
/// The result is itself a valid URL, and canonicalizing it again yields the same key.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use catscrape::url::canonicalize;
///
/// let a = Url::parse("http://X.com/a?b=1&a=2").unwrap();
/// let b = Url::parse("http://x.com:80/a?a=2&b=1").unwrap();
/// assert_eq!(canonicalize(&a), canonicalize(&b));
/// assert_eq!(canonicalize(&a), "http://x.com/a?a=2&b=1");
/// ```
pub fn canonicalize(url: &Url) -> String {
    let scheme = url.scheme().to_lowercase();

    let mut key = format!("{}://", scheme);
    if let Some(host) = url.host_str() {
        key.push_str(&host.to_lowercase());
    }

    // Url already elides default ports, this also covers hand-built http/https pairs
    if let Some(port) = url.port() {
        if Some(port) != default_port(&scheme) {
            key.push(':');
            key.push_str(&port.to_string());
        }
    }

    key.push_str(&normalize_path(url.path()));

    if let Some(query) = url.query() {
        let params = filter_and_sort_query_params(query);
        if !params.is_empty() {
            key.push('?');
            key.push_str(&params.join("&"));
        }
    }

    key
}

/// Parses a URL string and returns its canonical key
///
/// # Returns
///
/// * `Ok(String)` - The canonical key
/// * `Err(UrlError)` - The string is not an absolute HTTP(S) URL
pub fn canonicalize_str(url_str: &str) -> UrlResult<String> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(canonicalize(&url))
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Removes the trailing slash from a path unless it is the root
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Filters out tracking parameters and sorts remaining query parameters
///
/// Pairs keep their percent-encoded form, so values that are not valid UTF-8
/// (signatures, hashes) stay distinct.
fn filter_and_sort_query_params(query: &str) -> Vec<&str> {
    let mut params: Vec<&str> = query
        .split('&')
        .filter(|pair| {
            let (raw_key, _) = split_pair(pair);
            !raw_key.is_empty() && !is_tracking_param(&decode_key(raw_key))
        })
        .collect();

    params.sort_by(|a, b| split_pair(a).cmp(&split_pair(b)));
    params
}

fn split_pair(pair: &str) -> (&str, &str) {
    pair.split_once('=').unwrap_or((pair, ""))
}

/// Decodes a raw query key for comparison against the tracking list
fn decode_key(raw_key: &str) -> String {
    form_urlencoded::parse(raw_key.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&key.as_str()) || key.starts_with("utm_")
}
