//! Pagination discovery for category listings
//!
//! A next page is found either from an explicit navigation link in the markup or,
//! failing that, by incrementing a numeric page marker in the current URL.

use crate::url::{canonicalize, resolve_url};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Selectors for explicit "next" navigation, strongest signal first
const NEXT_LINK_SELECTORS: &[&str] = &[
    "link[rel~='next'][href]",
    "a[rel~='next'][href]",
    "a.next[href]",
    ".next > a[href]",
    "li.next a[href]",
    ".pagination-next a[href]",
    "a.pagination-next[href]",
    "a.pagination__next[href]",
    "a[aria-label='Next'][href]",
    "a[aria-label='Next page'][href]",
    "a[aria-label='next'][href]",
    "a.next-page[href]",
    "a.page-next[href]",
    "a.next-link[href]",
    "a.pager-next[href]",
    "a.pagination-link--next[href]",
];

/// Anchor texts that mean "next page" on their own
const NEXT_LINK_TEXTS: &[&str] = &[
    "next", "next page", "›", "»", ">", "→", ">>", "next ›", "next »", "next >", "next →",
];

/// Query parameters commonly used for page numbers
const PAGE_PARAMS: &[&str] = &["page", "p", "pg", "paged", "pagenumber", "page_no", "pageno"];

/// How a next page was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextSource {
    /// An explicit next link in the markup
    Link,
    /// A page counter incremented in the current URL
    Increment,
}

/// A discovered next page, before cycle rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPage {
    pub url: Url,
    pub page_index: u32,
    pub source: NextSource,
}

/// Finds the next page of a listing
///
/// Looks for an explicit next link first. If there is none and the current page
/// produced image candidates, a numeric page counter in the URL is incremented
/// (`?page=3` becomes `?page=4`, `/page/3/` becomes `/page/4/`).
///
/// This does not consult the visited set; see [`next_page`] for the full check.
pub fn discover_next(
    document: &Html,
    current_url: &Url,
    page_index: u32,
    has_candidates: bool,
) -> Option<NextPage> {
    if let Some(url) = find_next_link(document, current_url) {
        return Some(NextPage {
            url,
            page_index: page_index + 1,
            source: NextSource::Link,
        });
    }

    if !has_candidates {
        return None;
    }

    increment_page_number(current_url).map(|url| NextPage {
        url,
        page_index: page_index + 1,
        source: NextSource::Increment,
    })
}

/// Rejects a next page that was already visited
///
/// `visited` holds canonical keys. A link that points back to the same or an earlier
/// page ends pagination rather than looping.
pub fn reject_cycle(next: NextPage, visited: &HashSet<String>) -> Option<NextPage> {
    if visited.contains(&canonicalize(&next.url)) {
        tracing::debug!("Next link {} was already visited, ending pagination", next.url);
        None
    } else {
        Some(next)
    }
}

/// Determines the next page URL of a listing
///
/// # Arguments
///
/// * `html` - The current page's HTML
/// * `current_url` - The URL the current page was fetched from
/// * `page_index` - Zero-based position of the current page in its chain
/// * `has_candidates` - Whether the current page yielded image candidates
/// * `visited` - Canonical keys of pages already visited in this crawl
///
/// # Returns
///
/// * `Some(NextPage)` - A page that has not been visited yet
/// * `None` - Pagination ends here
pub fn next_page(
    html: &str,
    current_url: &Url,
    page_index: u32,
    has_candidates: bool,
    visited: &HashSet<String>,
) -> Option<NextPage> {
    let document = Html::parse_document(html);
    discover_next(&document, current_url, page_index, has_candidates)
        .and_then(|next| reject_cycle(next, visited))
}

/// Finds an explicit next link in the document
fn find_next_link(document: &Html, current_url: &Url) -> Option<Url> {
    for selector_str in NEXT_LINK_SELECTORS {
        let selector = match Selector::parse(selector_str) {
            Ok(s) => s,
            Err(_) => continue,
        };

        for element in document.select(&selector) {
            if is_disabled(&element) {
                continue;
            }
            if let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_url(href, current_url))
            {
                return Some(url);
            }
        }
    }

    let anchor = Selector::parse("a[href]").ok()?;
    document
        .select(&anchor)
        .filter(|element| !is_disabled(element))
        .filter(|element| {
            let text = element.text().collect::<String>();
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
            NEXT_LINK_TEXTS.contains(&text.as_str())
        })
        .find_map(|element| {
            element
                .value()
                .attr("href")
                .and_then(|href| resolve_url(href, current_url))
        })
}

fn is_disabled(element: &ElementRef) -> bool {
    let attrs = element.value();
    attrs.attr("aria-disabled") == Some("true")
        || attrs.attr("disabled").is_some()
        || attrs.classes().any(|class| class == "disabled")
}

/// Increments a numeric page counter in the URL, if there is one
fn increment_page_number(url: &Url) -> Option<Url> {
    increment_query_param(url).or_else(|| increment_path_segment(url))
}

fn increment_query_param(url: &Url) -> Option<Url> {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let position = pairs.iter().position(|(key, value)| {
        PAGE_PARAMS.contains(&key.to_ascii_lowercase().as_str()) && value.parse::<u32>().is_ok()
    })?;
    let number: u32 = pairs[position].1.parse().ok()?;
    let incremented = number.checked_add(1)?.to_string();

    let mut next = url.clone();
    {
        let mut query = next.query_pairs_mut();
        query.clear();
        for (index, (key, value)) in pairs.iter().enumerate() {
            if index == position {
                query.append_pair(key, &incremented);
            } else {
                query.append_pair(key, value);
            }
        }
    }
    Some(next)
}

fn increment_path_segment(url: &Url) -> Option<Url> {
    let mut segments: Vec<String> = url.path_segments()?.map(str::to_string).collect();
    let marker = segments.iter().position(|segment| segment == "page")?;
    let number: u32 = segments.get(marker + 1)?.parse().ok()?;
    segments[marker + 1] = number.checked_add(1)?.to_string();

    let mut next = url.clone();
    next.set_path(&format!("/{}", segments.join("/")));
    Some(next)
}
