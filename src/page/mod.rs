//! Fetched page abstraction
//!
//! A [`Page`] bundles the raw body of a fetched response with its parsed DOM and every
//! embedded JSON-LD block, so that extraction strategies can query whichever
//! representation they need.
//!
//! `scraper::Html` is not `Send`, so a `Page` is built, queried and dropped synchronously
//! between two suspension points; it is never held across an `.await`.

mod selector;
mod structured;

pub use selector::{SelectorSpec, Target};
pub use structured::{find_product, first_offer, parse_json_ld, parse_json_ld_block, value_text};

use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

/// A fetched page, parsed and ready for extraction
pub struct Page {
    url: Url,
    body: String,
    document: Html,
    structured: Vec<Value>,
    rendered: bool,
}

impl Page {
    /// Parses a response body fetched from `url`
    ///
    /// # Arguments
    ///
    /// * `url` - The final URL of the response (after redirects)
    /// * `body` - The response body
    /// * `rendered` - Whether the body came from a script-executing fetch
    pub fn parse(url: Url, body: impl Into<String>, rendered: bool) -> Self {
        let body = body.into();
        let document = Html::parse_document(&body);
        let structured = parse_json_ld(&document);

        Self {
            url,
            body,
            document,
            structured,
            rendered,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    /// All JSON-LD nodes found on the page, with lists and `@graph` containers flattened
    pub fn structured(&self) -> &[Value] {
        &self.structured
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    /// Returns the first non-empty value produced by the given selectors, in order
    ///
    /// Plain CSS selectors yield the element text.
    pub fn first_value(&self, specs: &[SelectorSpec]) -> Option<String> {
        specs
            .iter()
            .find_map(|spec| spec.values(&self.document, None).into_iter().next())
    }

    /// Returns the `content` of the first `<meta>` tag with the given `property` or `name`
    pub fn meta_content(&self, key: &str) -> Option<String> {
        let css = format!("meta[property=\"{key}\"], meta[name=\"{key}\"]");
        let selector = Selector::parse(&css).ok()?;

        self.document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(collapse_whitespace)
            .find(|s| !s.is_empty())
    }

    /// Returns the whitespace-collapsed text of the first element matching `css`
    pub fn element_text(&self, css: &str) -> Option<String> {
        let selector = Selector::parse(css).ok()?;

        self.document
            .select(&selector)
            .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .find(|s| !s.is_empty())
    }

    /// Lowercased visible text of the whole document, used for marker scans
    ///
    /// Text inside `<script>`, `<style>` and `<noscript>` is skipped.
    pub fn lowercase_text(&self) -> String {
        self.document
            .root_element()
            .descendants()
            .filter_map(|node| {
                let text = node.value().as_text()?;
                let parent = node.parent()?;
                match parent.value().as_element() {
                    Some(el) if matches!(el.name(), "script" | "style" | "noscript") => None,
                    _ => Some(&**text),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

/// Trims a string and collapses internal runs of whitespace into single spaces
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
