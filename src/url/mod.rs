//! URL handling module for Catscrape
//!
//! This module provides attribute-value resolution, canonical deduplication keys,
//! and origin helpers used for robots.txt lookups.

mod domain;
mod normalize;

use url::Url;

// Re-export main functions
pub use domain::{origin_key, robots_url};
pub use normalize::{canonicalize, canonicalize_str};

/// Schemes that never point at a fetchable image or page
const SKIPPED_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:", "blob:", "about:"];

/// Resolves a raw attribute value to an absolute HTTP(S) URL
///
/// Handles absolute (`https://host/a.jpg`), protocol-relative (`//host/a.jpg`)
/// and relative (`a.jpg`, `/img/a.jpg`, `../a.jpg`) forms. Returns None if the
/// value should be skipped:
/// - empty or whitespace-only values
/// - fragment-only references
/// - javascript:, mailto:, tel:, data:, blob: and about: URIs
/// - values that fail to parse
/// - non-HTTP(S) URLs after resolution
///
/// # Examples
///
/// ```
/// use url::Url;
/// use catscrape::url::resolve_url;
///
/// let base = Url::parse("https://shop.example.com/c/shoes").unwrap();
/// assert_eq!(
///     resolve_url("//cdn.example.com/a.jpg", &base).unwrap().as_str(),
///     "https://cdn.example.com/a.jpg"
/// );
/// assert_eq!(
///     resolve_url("img/b.jpg", &base).unwrap().as_str(),
///     "https://shop.example.com/c/img/b.jpg"
/// );
/// assert!(resolve_url("data:image/gif;base64,R0lGOD", &base).is_none());
/// ```
pub fn resolve_url(raw: &str, base_url: &Url) -> Option<Url> {
    let raw = raw.trim();

    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let lowered = raw.to_ascii_lowercase();
    if SKIPPED_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return None;
    }

    match base_url.join(raw) {
        Ok(absolute_url) => {
            if (absolute_url.scheme() == "http" || absolute_url.scheme() == "https")
                && absolute_url.host_str().is_some()
            {
                Some(absolute_url)
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
