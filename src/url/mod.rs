//! URL handling module for Shelf-Tracker
//!
//! This module provides href resolution, canonical product URLs, domain extraction
//! for per-domain throttling, and retailer domain matching.

mod domain;
mod matcher;
mod normalize;

pub use domain::extract_domain;
pub use matcher::matches_wildcard;
pub use normalize::{canonical_product_url, resolve_href};

use url::Url;

/// Returns true if the URL's host belongs to one of the retailer's domain patterns
///
/// An empty pattern list accepts every host.
pub fn is_retailer_host(url: &Url, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }

    match extract_domain(url) {
        Some(host) => patterns.iter().any(|p| matches_wildcard(p, &host)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retailer_host() {
        let patterns = vec!["*.heb.com.mx".to_string()];
        let own = Url::parse("https://www.heb.com.mx/x/p").unwrap();
        let other = Url::parse("https://www.soriana.com/x.html").unwrap();

        assert!(is_retailer_host(&own, &patterns));
        assert!(!is_retailer_host(&other, &patterns));
    }

    #[test]
    fn test_empty_patterns_accept_everything() {
        let url = Url::parse("http://127.0.0.1:9000/item/p").unwrap();
        assert!(is_retailer_host(&url, &[]));
    }
}
