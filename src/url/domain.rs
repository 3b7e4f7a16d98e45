use url::Url;

/// Extracts the throttling key (lowercase host) from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use shelf_tracker::url::extract_domain;
///
/// let url = Url::parse("https://WWW.HEB.com.mx/harina/p").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.heb.com.mx".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
