use crate::page::Page;
use crate::retailer::Retailer;
use crate::url::{extract_domain, is_retailer_host, resolve_href};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

/// Quoted absolute or root-relative URLs anywhere in the raw body
static QUOTED_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']((?:https?:)?//[^"'\s<>]+|/[^"'\s<>]+)["']"#)
        .expect("quoted URL pattern is valid")
});

/// Enumerates candidate product URLs on a listing page
///
/// Link selectors are applied in order; results are resolved against the page URL,
/// canonicalized, filtered to the retailer's product-URL shape and de-duplicated in
/// first-seen order. When no selector yields a product link the raw body is scanned for
/// quoted URLs of the same shape.
pub fn extract_candidate_links(retailer: &Retailer, page: &Page) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for spec in &retailer.link_selectors {
        for href in spec.values(page.document(), Some("href")) {
            push_candidate(retailer, page, &href, &mut seen, &mut links);
        }
    }

    if links.is_empty() {
        for caps in QUOTED_URL.captures_iter(page.body()) {
            if let Some(m) = caps.get(1) {
                push_candidate(retailer, page, m.as_str(), &mut seen, &mut links);
            }
        }

        if !links.is_empty() {
            debug!(
                url = %page.url(),
                "Selectors found no product links, raw scan found {}",
                links.len()
            );
        }
    }

    links
}

fn push_candidate(
    retailer: &Retailer,
    page: &Page,
    href: &str,
    seen: &mut HashSet<Url>,
    links: &mut Vec<Url>,
) {
    if let Some(url) = resolve_href(href, page.url()) {
        if is_product_url(retailer, page.url(), &url) && seen.insert(url.clone()) {
            links.push(url);
        }
    }
}

/// Returns true if `url` has the retailer's product-URL shape
///
/// The host must be one of the retailer's domains or the listing page's own host, the path
/// must not contain a non-product marker, and the path must match the product URL pattern
/// when the retailer defines one.
pub fn is_product_url(retailer: &Retailer, listing_url: &Url, url: &Url) -> bool {
    let same_host = extract_domain(url) == extract_domain(listing_url);
    if !same_host && !is_retailer_host(url, &retailer.config().domains) {
        return false;
    }

    let path = url.path();
    if retailer
        .config()
        .non_product_path_markers
        .iter()
        .any(|marker| path.contains(marker.as_str()))
    {
        return false;
    }

    match &retailer.product_url_pattern {
        Some(pattern) => pattern.is_match(path),
        None => path != "/",
    }
}
