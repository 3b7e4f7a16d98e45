//! Query slugification for path-based search URLs

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Placeholder returned when a query has no usable characters
pub const EMPTY_SLUG: &str = "buscar";

/// Turns a free-text query into a URL path segment
///
/// Diacritics are removed (NFKD + combining marks dropped), the text is lowercased,
/// every run of characters outside `[a-z0-9]` becomes one hyphen, and leading or
/// trailing hyphens are trimmed. An empty result becomes [`EMPTY_SLUG`].
///
/// # Examples
///
/// ```
/// use shelf_tracker::normalize::slugify;
///
/// assert_eq!(slugify("Harina de Maíz"), "harina-de-maiz");
/// assert_eq!(slugify("  ¡¿?! "), "buscar");
/// ```
pub fn slugify(query: &str) -> String {
    let mut slug = String::with_capacity(query.len());
    let mut pending_hyphen = false;

    for c in query.nfkd().filter(|c| !is_combining_mark(*c)) {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug
    }
}
