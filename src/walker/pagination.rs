use crate::page::Page;
use crate::retailer::Retailer;
use crate::url::resolve_href;
use url::Url;

const PAGE_PARAM: &str = "page";

/// Computes the next listing page, if any
///
/// Tries the retailer's next-page selectors in order, then a `page=N` increment of the
/// current URL. A retailer that synthesizes page parameters gets `page=2` appended to a URL
/// without one. Links pointing back at the current page are ignored.
pub fn find_next_page(retailer: &Retailer, page: &Page) -> Option<Url> {
    let current = page.url();

    let explicit = retailer.next_page_selectors.iter().find_map(|spec| {
        spec.values(page.document(), Some("href"))
            .into_iter()
            .filter_map(|href| resolve_href(&href, current))
            .find(|url| url != current)
    });

    explicit.or_else(|| increment_page_param(current, retailer.config().synthesize_page_param))
}

/// Increments the `page` query parameter of a URL
///
/// # Arguments
///
/// * `url` - The current listing URL
/// * `synthesize` - Append `page=2` when the URL has no page parameter
///
/// # Examples
///
/// ```
/// use shelf_tracker::walker::increment_page_param;
/// use url::Url;
///
/// let url = Url::parse("https://super.walmart.com.mx/search?q=cafe&page=3").unwrap();
/// let next = increment_page_param(&url, false).unwrap();
/// assert_eq!(next.as_str(), "https://super.walmart.com.mx/search?q=cafe&page=4");
///
/// let first = Url::parse("https://super.walmart.com.mx/search?q=cafe").unwrap();
/// assert!(increment_page_param(&first, false).is_none());
/// assert_eq!(
///     increment_page_param(&first, true).unwrap().as_str(),
///     "https://super.walmart.com.mx/search?q=cafe&page=2"
/// );
/// ```
pub fn increment_page_param(url: &Url, synthesize: bool) -> Option<Url> {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    match pairs.iter_mut().find(|(k, _)| k == PAGE_PARAM) {
        Some((_, value)) => {
            let current: u32 = value.trim().parse().ok()?;
            *value = current.checked_add(1)?.to_string();
        }
        None if synthesize => pairs.push((PAGE_PARAM.to_string(), "2".to_string())),
        None => return None,
    }

    let mut next = url.clone();
    next.query_pairs_mut().clear().extend_pairs(pairs);
    Some(next)
}
