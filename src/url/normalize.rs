use crate::UrlError;
use url::Url;

/// Query parameters that never identify a product and are dropped from canonical URLs
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "srsltid",
    "gad_source",
];

/// Resolves an `href` found on a page into an absolute, canonical URL
///
/// Returns `None` for links that can never be fetched as pages:
/// `javascript:`, `mailto:`, `tel:`, `data:` URIs, fragment-only anchors,
/// empty values, and anything that does not resolve to HTTP(S).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use shelf_tracker::url::resolve_href;
///
/// let base = Url::parse("https://www.heb.com.mx/harina?_q=harina").unwrap();
/// let url = resolve_href("/harina-selecta-1kg-123456/p#reviews", &base).unwrap();
/// assert_eq!(url.as_str(), "https://www.heb.com.mx/harina-selecta-1kg-123456/p");
/// ```
pub fn resolve_href(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let joined = base.join(href).ok()?;
    canonical_product_url(joined.as_str()).ok()
}

/// Canonicalizes a product or listing URL
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host
/// 3. Collapse empty and dot path segments, drop a trailing slash (except root)
/// 4. Remove the fragment
/// 5. Remove tracking query parameters, keeping the order of the rest
/// 6. Remove an empty query string
///
/// The `www.` prefix and the scheme are preserved: retailers serve different
/// content on bare hosts, and local test servers speak plain HTTP.
pub fn canonical_product_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingDomain)?;
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let path = normalize_path(url.path());
    url.set_path(&path);

    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments, empty segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
