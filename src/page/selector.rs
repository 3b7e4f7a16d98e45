//! Selector patterns with extraction targets
//!
//! Retailer rows describe what to pull out of a page with selector patterns such as
//! `a.card::attr(href)`, `div.price ::text` or plain `h1`. This module parses those
//! patterns into a compiled CSS selector plus a [`Target`].

use scraper::{Html, Selector};
use std::fmt;

/// What a selector pattern extracts from each matched element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// All descendant text nodes (`::text`)
    Text,

    /// A named attribute (`::attr(name)`)
    Attr(String),

    /// No suffix: the caller decides (an attribute for links, text otherwise)
    Element,
}

/// A compiled selector pattern
#[derive(Clone)]
pub struct SelectorSpec {
    source: String,
    selector: Selector,
    target: Target,
}

impl fmt::Debug for SelectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectorSpec")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

impl SelectorSpec {
    /// Parses a selector pattern
    ///
    /// # Returns
    ///
    /// * `Some(SelectorSpec)` - The pattern compiled
    /// * `None` - The CSS part is empty or invalid
    ///
    /// # Examples
    ///
    /// ```
    /// use shelf_tracker::page::{SelectorSpec, Target};
    ///
    /// let spec = SelectorSpec::parse("[itemprop=\"price\"]::attr(content)").unwrap();
    /// assert_eq!(spec.target(), &Target::Attr("content".to_string()));
    ///
    /// let spec = SelectorSpec::parse("div.price ::text").unwrap();
    /// assert_eq!(spec.target(), &Target::Text);
    /// ```
    pub fn parse(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim();
        let (css, target) = split_target(pattern)?;
        let css = css.trim();

        if css.is_empty() {
            return None;
        }

        let selector = Selector::parse(css).ok()?;

        Some(Self {
            source: pattern.to_string(),
            selector,
            target,
        })
    }

    /// Parses a list of patterns, returning the first invalid one as the error
    pub fn parse_all(patterns: &[String]) -> Result<Vec<Self>, String> {
        patterns
            .iter()
            .map(|p| Self::parse(p).ok_or_else(|| p.clone()))
            .collect()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Extracts one value per matched element, skipping empty ones
    ///
    /// `element_attr` is read for patterns without a suffix; when `None`, their text is used.
    pub fn values(&self, document: &Html, element_attr: Option<&str>) -> Vec<String> {
        document
            .select(&self.selector)
            .filter_map(|el| {
                let value = match (&self.target, element_attr) {
                    (Target::Attr(name), _) => el.value().attr(name).map(str::to_string),
                    (Target::Element, Some(name)) => el.value().attr(name).map(str::to_string),
                    (Target::Text, _) | (Target::Element, None) => {
                        Some(el.text().collect::<Vec<_>>().join(" "))
                    }
                };
                value.map(|v| super::collapse_whitespace(&v))
            })
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Returns true if any element matches, whatever the target
    pub fn matches(&self, document: &Html) -> bool {
        document.select(&self.selector).next().is_some()
    }

    /// Concatenates every non-empty text node of every matched element
    ///
    /// Prices are often split across nodes (`<span>$ 25</span><sup>.50</sup>`); joining the
    /// trimmed pieces without a separator restores `$ 25.50`. Attribute patterns return the
    /// first non-empty attribute value instead.
    pub fn joined_text(&self, document: &Html) -> Option<String> {
        let joined = match &self.target {
            Target::Attr(_) => return self.values(document, None).into_iter().next(),
            Target::Text | Target::Element => document
                .select(&self.selector)
                .flat_map(|el| el.text())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<String>(),
        };

        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

fn split_target(pattern: &str) -> Option<(&str, Target)> {
    if let Some(css) = pattern.strip_suffix("::text") {
        return Some((css, Target::Text));
    }

    if pattern.ends_with(')') {
        if let Some(idx) = pattern.rfind("::attr(") {
            let name = pattern[idx + "::attr(".len()..pattern.len() - 1].trim();
            if name.is_empty() {
                return None;
            }
            return Some((&pattern[..idx], Target::Attr(name.to_string())));
        }
    }

    Some((pattern, Target::Element))
}
