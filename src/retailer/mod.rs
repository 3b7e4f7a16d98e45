//! Per-retailer configuration table
//!
//! Every retailer is one row of data: selector patterns, URL shapes and seeds. The generic
//! extractor and listing walker operate over a compiled [`Retailer`]; adding a store means
//! adding a row (built-in or `[[retailer]]` in the config file), not new control flow.

mod builtin;

pub use builtin::builtin_retailers;

use crate::normalize::slugify;
use crate::page::SelectorSpec;
use crate::record::StoreTag;
use crate::{ConfigError, ConfigResult, UrlError, UrlResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// One retailer row, as written in configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct RetailerConfig {
    /// Retailer identifier, also used as the store tag of its records
    pub id: String,

    /// Host patterns (`*.soriana.com`) product links must belong to; empty accepts any host
    pub domains: Vec<String>,

    /// Ordered selector patterns yielding product links on listing pages
    pub link_selectors: Vec<String>,

    /// Ordered selector patterns yielding the next listing page
    pub next_page_selectors: Vec<String>,

    pub price_selectors: Vec<String>,

    pub sku_selectors: Vec<String>,

    pub currency_selectors: Vec<String>,

    /// Any match marks the product as in stock
    pub stock_selectors: Vec<String>,

    pub image_selectors: Vec<String>,

    /// Path substrings that disqualify a link as a product (`/blog/`, `/tiendas/`)
    pub non_product_path_markers: Vec<String>,

    /// Regex a product URL path must match (`/p$`, `\.html$`)
    pub product_url_pattern: Option<String>,

    /// Regexes whose first capture group is the SKU inside a product URL path
    pub sku_url_patterns: Vec<String>,

    /// Search URL with `{slug}` and/or `{query}` placeholders
    pub base_search_url_template: Option<String>,

    /// Listing pages crawled when neither a query nor product URLs are given
    pub category_urls: Vec<String>,

    /// Listing pages only expose products after scripts run
    pub requires_rendering: bool,

    /// DOM element a rendered listing fetch waits for
    pub listing_wait_selector: Option<String>,

    /// DOM element a rendered product re-fetch waits for
    pub render_wait_selector: Option<String>,

    /// Append `page=2` to listing URLs that carry no page parameter
    pub synthesize_page_param: bool,

    /// Lowercase page-text markers of an anti-bot interstitial
    pub bot_wall_markers: Vec<String>,
}

/// A retailer row with its selectors and patterns compiled
#[derive(Debug)]
pub struct Retailer {
    config: RetailerConfig,
    store: StoreTag,
    pub(crate) link_selectors: Vec<SelectorSpec>,
    pub(crate) next_page_selectors: Vec<SelectorSpec>,
    pub(crate) price_selectors: Vec<SelectorSpec>,
    pub(crate) sku_selectors: Vec<SelectorSpec>,
    pub(crate) currency_selectors: Vec<SelectorSpec>,
    pub(crate) stock_selectors: Vec<SelectorSpec>,
    pub(crate) image_selectors: Vec<SelectorSpec>,
    pub(crate) product_url_pattern: Option<Regex>,
    pub(crate) sku_url_patterns: Vec<Regex>,
}

impl Retailer {
    /// Compiles a retailer row
    ///
    /// # Returns
    ///
    /// * `Ok(Retailer)` - Every selector and pattern compiled
    /// * `Err(ConfigError)` - The row is invalid
    pub fn compile(config: RetailerConfig) -> ConfigResult<Self> {
        let id = config.id.trim().to_string();
        if id.is_empty() {
            return Err(ConfigError::Validation(
                "Retailer id cannot be empty".to_string(),
            ));
        }

        let selectors = |patterns: &[String]| {
            SelectorSpec::parse_all(patterns).map_err(|selector| ConfigError::InvalidSelector {
                retailer: id.clone(),
                selector,
            })
        };

        let link_selectors = selectors(&config.link_selectors)?;
        let next_page_selectors = selectors(&config.next_page_selectors)?;
        let price_selectors = selectors(&config.price_selectors)?;
        let sku_selectors = selectors(&config.sku_selectors)?;
        let currency_selectors = selectors(&config.currency_selectors)?;
        let stock_selectors = selectors(&config.stock_selectors)?;
        let image_selectors = selectors(&config.image_selectors)?;

        let pattern = |source: &str| {
            Regex::new(source).map_err(|e| ConfigError::InvalidPattern {
                retailer: id.clone(),
                message: e.to_string(),
            })
        };

        let product_url_pattern = config
            .product_url_pattern
            .as_deref()
            .map(pattern)
            .transpose()?;

        let sku_url_patterns = config
            .sku_url_patterns
            .iter()
            .map(|p| pattern(p))
            .collect::<ConfigResult<Vec<_>>>()?;

        if let Some(template) = &config.base_search_url_template {
            if !template.contains("{query}") && !template.contains("{slug}") {
                return Err(ConfigError::Validation(format!(
                    "Search URL template of retailer '{}' needs a {{query}} or {{slug}} placeholder",
                    id
                )));
            }
        }

        for category in &config.category_urls {
            match Url::parse(category) {
                Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
                _ => {
                    return Err(ConfigError::InvalidUrl(format!(
                        "Category URL of retailer '{}' is not HTTP(S): {}",
                        id, category
                    )))
                }
            }
        }

        Ok(Self {
            store: StoreTag::new(&id),
            config,
            link_selectors,
            next_page_selectors,
            price_selectors,
            sku_selectors,
            currency_selectors,
            stock_selectors,
            image_selectors,
            product_url_pattern,
            sku_url_patterns,
        })
    }

    pub fn id(&self) -> &str {
        self.store.as_str()
    }

    pub fn store(&self) -> &StoreTag {
        &self.store
    }

    pub fn config(&self) -> &RetailerConfig {
        &self.config
    }

    pub fn requires_rendering(&self) -> bool {
        self.config.requires_rendering
    }

    /// Builds the search listing URL for one query term
    ///
    /// `{slug}` is replaced with the slugified term and `{query}` with the
    /// form-encoded term.
    ///
    /// # Examples
    ///
    /// ```
    /// use shelf_tracker::retailer::{Retailer, RetailerConfig};
    ///
    /// let retailer = Retailer::compile(RetailerConfig {
    ///     id: "heb".to_string(),
    ///     base_search_url_template: Some("https://www.heb.com.mx/{slug}?_q={query}&map=ft".to_string()),
    ///     ..Default::default()
    /// })
    /// .unwrap();
    ///
    /// let url = retailer.search_url("Harina de trigo").unwrap();
    /// assert_eq!(url.as_str(), "https://www.heb.com.mx/harina-de-trigo?_q=Harina+de+trigo&map=ft");
    /// ```
    pub fn search_url(&self, query: &str) -> UrlResult<Url> {
        let template = self.config.base_search_url_template.as_deref().ok_or_else(|| {
            UrlError::Malformed(format!("Retailer '{}' has no search URL template", self.id()))
        })?;

        let encoded: String = url::form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
        let filled = template
            .replace("{slug}", &slugify(query))
            .replace("{query}", &encoded);

        Url::parse(&filled).map_err(|e| UrlError::Parse(e.to_string()))
    }

    /// Default category listing URLs, skipping any that fail to parse
    pub fn category_urls(&self) -> Vec<Url> {
        self.config
            .category_urls
            .iter()
            .filter_map(|u| Url::parse(u).ok())
            .collect()
    }

    /// Returns true if the page text contains one of the retailer's bot-wall markers
    pub fn is_bot_wall(&self, lowercase_text: &str) -> bool {
        self.config
            .bot_wall_markers
            .iter()
            .any(|marker| lowercase_text.contains(&marker.to_lowercase()))
    }
}

/// The compiled retailer table: built-in rows, with configured rows replacing them by id
#[derive(Debug, Clone)]
pub struct RetailerTable {
    retailers: Vec<Arc<Retailer>>,
}

impl RetailerTable {
    /// Builds the table from the built-in rows and the configured overrides
    ///
    /// # Arguments
    ///
    /// * `overrides` - Configured rows; a row whose id matches a built-in replaces it,
    ///   any other row is appended
    pub fn build(overrides: &[RetailerConfig]) -> ConfigResult<Self> {
        let mut seen = HashSet::new();
        for row in overrides {
            if !seen.insert(row.id.trim().to_string()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate retailer id: {}",
                    row.id
                )));
            }
        }

        let mut rows = builtin_retailers();
        for row in overrides {
            match rows.iter_mut().find(|r| r.id == row.id.trim()) {
                Some(existing) => *existing = row.clone(),
                None => rows.push(row.clone()),
            }
        }

        let retailers = rows
            .into_iter()
            .map(|row| Retailer::compile(row).map(Arc::new))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self { retailers })
    }

    /// Looks up a retailer by id (case-insensitive)
    pub fn get(&self, id: &str) -> Option<Arc<Retailer>> {
        let id = id.trim();
        self.retailers
            .iter()
            .find(|r| r.id().eq_ignore_ascii_case(id))
            .cloned()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.retailers.iter().map(|r| r.id()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Retailer>> {
        self.retailers.iter()
    }
}
