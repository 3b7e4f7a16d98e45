/// Checks if a host matches a retailer domain pattern
///
/// Patterns are either exact (`"soriana.com"`) or wildcard (`"*.soriana.com"`), where the
/// wildcard form matches the bare domain and any subdomain.
///
/// # Examples
///
/// ```
/// use shelf_tracker::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.walmart.com.mx", "super.walmart.com.mx"));
/// assert!(matches_wildcard("*.walmart.com.mx", "walmart.com.mx"));
/// assert!(!matches_wildcard("*.walmart.com.mx", "notwalmart.com.mx"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}
