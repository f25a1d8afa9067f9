//! HTML image extractor
//!
//! This module pulls candidate image URLs out of a category page:
//! - Lazy-load attributes (`data-src` and friends)
//! - Responsive sources (`srcset`, `data-srcset`)
//! - The plain `src` attribute
//!
//! Extraction is best effort. Bad attribute values are skipped, never reported.

use crate::url::resolve_url;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Lazy-load attributes, checked in order; the first usable one wins
const LAZY_ATTRIBUTES: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-lazy",
    "data-url",
    "data-echo",
    "data-hi-res-src",
    "data-full-src",
    "data-zoom-image",
    "data-original-src",
];

/// Responsive-source attributes, checked in order
const SRCSET_ATTRIBUTES: &[&str] = &["data-srcset", "data-lazy-srcset", "srcset"];

/// How a candidate URL was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    /// Taken from the standard `src` attribute
    Plain,
    /// Taken from a lazy-load attribute
    Lazy,
    /// Chosen from a responsive-source descriptor list
    SrcsetVariant,
}

/// One image URL found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    /// The attribute value (or srcset entry) before resolution
    pub raw_value: String,
    /// The absolute image URL
    pub resolved_url: Url,
    /// The page the image was found on
    pub source_page: Url,
    /// Which attribute produced it
    pub kind: CandidateKind,
}

/// Extracts image candidates from an HTML document
///
/// For every `<img>` and `<picture><source>` element the attributes are examined in
/// priority order:
///
/// 1. Lazy-load attributes (`data-src`, `data-lazy-src`, `data-original`, ...)
/// 2. Responsive sources: the entry with the largest width descriptor, or the first
///    entry when no width descriptors are present
/// 3. The standard `src` attribute
///
/// The first value that resolves to an absolute HTTP(S) URL wins. A `<base href>`
/// in the document takes precedence over `base_url` for resolution.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The URL the page was fetched from
///
/// # Returns
///
/// Candidates in document order. Duplicates within one page are kept.
///
/// # Example
///
/// ```
/// use catscrape::crawler::extract_images;
/// use url::Url;
///
/// let html = r#"<img src="placeholder.gif" data-src="real.jpg">"#;
/// let base_url = Url::parse("https://shop.example.com/c/").unwrap();
/// let candidates = extract_images(html, &base_url);
/// assert_eq!(candidates[0].resolved_url.as_str(), "https://shop.example.com/c/real.jpg");
/// ```
pub fn extract_images(html: &str, base_url: &Url) -> Vec<ImageCandidate> {
    let document = Html::parse_document(html);
    extract_from_document(&document, base_url)
}

/// Same as [`extract_images`] for an already parsed document
pub fn extract_from_document(document: &Html, base_url: &Url) -> Vec<ImageCandidate> {
    let mut candidates = Vec::new();

    let selector = match Selector::parse("img, picture source") {
        Ok(s) => s,
        Err(_) => return candidates,
    };

    let resolution_base = document_base(document, base_url);

    for element in document.select(&selector) {
        if let Some((raw_value, resolved_url, kind)) = best_source(&element, &resolution_base) {
            candidates.push(ImageCandidate {
                raw_value,
                resolved_url,
                source_page: base_url.clone(),
                kind,
            });
        }
    }

    candidates
}

/// Returns the effective base URL, honoring `<base href>`
fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|base| base.value().attr("href"))
                .and_then(|href| resolve_url(href, page_url))
        })
        .unwrap_or_else(|| page_url.clone())
}

/// Picks the best source of one image-bearing element
fn best_source(element: &ElementRef, base_url: &Url) -> Option<(String, Url, CandidateKind)> {
    let attrs = element.value();

    for name in LAZY_ATTRIBUTES {
        if let Some(value) = attrs.attr(name) {
            if let Some(url) = resolve_url(value, base_url) {
                return Some((value.trim().to_string(), url, CandidateKind::Lazy));
            }
        }
    }

    for name in SRCSET_ATTRIBUTES {
        if let Some(value) = attrs.attr(name) {
            // Entries that do not resolve (data: URIs, blobs) are not eligible
            let resolvable = srcset_entries(value).into_iter().filter_map(|(raw, width)| {
                resolve_url(raw, base_url).map(|url| ((raw, url), width))
            });
            if let Some((raw, url)) = choose_entry(resolvable) {
                return Some((raw.to_string(), url, CandidateKind::SrcsetVariant));
            }
        }
    }

    attrs
        .attr("src")
        .and_then(|value| resolve_url(value, base_url).map(|url| (value.trim().to_string(), url)))
        .map(|(raw, url)| (raw, url, CandidateKind::Plain))
}

/// Chooses one URL token from a responsive-source descriptor list
///
/// Each entry is a URL followed by optional descriptors, entries are separated by
/// commas. The entry with the largest `w` descriptor wins. Density descriptors
/// (`2x`) are not comparable to widths, so without any width descriptor the first
/// entry is used.
///
/// # Example
///
/// ```
/// use catscrape::crawler::pick_srcset_entry;
///
/// assert_eq!(pick_srcset_entry("a.jpg 480w, b.jpg 1200w"), Some("b.jpg"));
/// assert_eq!(pick_srcset_entry("a.jpg 1x, b.jpg 2x"), Some("a.jpg"));
/// ```
pub fn pick_srcset_entry(srcset: &str) -> Option<&str> {
    choose_entry(srcset_entries(srcset).into_iter())
}

/// Splits a descriptor list into `(url, width)` pairs
///
/// A URL runs up to the next whitespace, so commas inside it (data URIs) do not
/// split the entry. Trailing commas on the URL end the entry without descriptors.
fn srcset_entries(srcset: &str) -> Vec<(&str, Option<u32>)> {
    let mut entries = Vec::new();
    let mut rest = srcset;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let url_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (url, after) = rest.split_at(url_end);
        if url.ends_with(',') {
            entries.push((url.trim_end_matches(','), None));
            rest = after;
            continue;
        }

        let descriptors_end = after.find(',').unwrap_or(after.len());
        let (descriptors, remaining) = after.split_at(descriptors_end);
        let width = descriptors
            .split_whitespace()
            .find_map(|descriptor| descriptor.strip_suffix('w')?.parse::<u32>().ok());
        entries.push((url, width));
        rest = remaining;
    }

    entries
}

/// The entry with the largest width wins, otherwise the first entry
fn choose_entry<T: Clone>(entries: impl Iterator<Item = (T, Option<u32>)>) -> Option<T> {
    let mut first: Option<T> = None;
    let mut widest: Option<(u32, T)> = None;

    for (entry, width) in entries {
        if first.is_none() {
            first = Some(entry.clone());
        }
        if let Some(width) = width {
            if widest.as_ref().map_or(true, |(best, _)| width > *best) {
                widest = Some((width, entry));
            }
        }
    }

    widest.map(|(_, entry)| entry).or(first)
}
