use url::Url;

/// Returns the origin of a URL as a cache key (`scheme://host[:port]`)
///
/// Robots rules are scoped to an origin, so two seeds on the same shop share one
/// robots.txt lookup while a CDN host gets its own.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use catscrape::url::origin_key;
///
/// let url = Url::parse("https://Shop.Example.com/c/shoes?page=2").unwrap();
/// assert_eq!(origin_key(&url), Some("https://shop.example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/c").unwrap();
/// assert_eq!(origin_key(&url), Some("http://127.0.0.1:8080".to_string()));
/// ```
pub fn origin_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}://{}:{}", url.scheme(), host, port)),
        None => Some(format!("{}://{}", url.scheme(), host)),
    }
}

/// Returns the robots.txt location for the origin of `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    url.host_str()?;
    url.join("/robots.txt").ok()
}
