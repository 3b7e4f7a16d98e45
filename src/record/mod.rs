//! The canonical product record and its assembler
//!
//! Extraction yields a [`PartialRecord`] where every field may be missing. The assembler
//! turns it into a [`ProductRecord`]: defaults are applied, the SKU is derived from the URL
//! when nothing else found one, and the store tag and capture time are attached.

use crate::extract::{sku_from_url, PartialRecord, DEFAULT_CURRENCY};
use crate::retailer::Retailer;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Identifies the retailer a record was captured from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreTag(String);

impl StoreTag {
    /// Creates a tag from a retailer id (lowercased)
    pub fn new(id: &str) -> Self {
        Self(id.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One observation of a product on a retailer site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub store: StoreTag,

    /// Canonical absolute product URL
    pub url: Url,

    /// Product title; empty when no strategy found one
    pub title: String,

    pub sku: Option<String>,

    /// Parsed price; `None` only when every strategy failed, rendering included
    pub price: Option<Decimal>,

    /// Price text as found in the DOM, kept for audit
    pub price_raw: Option<String>,

    pub currency: String,

    pub in_stock: Option<bool>,

    pub image_url: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl ProductRecord {
    /// Names of the fields the storage gate requires but this record lacks
    ///
    /// # Returns
    ///
    /// An empty list when the record carries a title, a price and an image.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();

        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.price.is_none() {
            missing.push("price");
        }
        if self.image_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            missing.push("image_url");
        }

        missing
    }

    /// Returns true if the storage gate would accept this record
    pub fn is_storable(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Assembles a product record from extraction output
///
/// # Arguments
///
/// * `retailer` - The retailer the page belongs to
/// * `url` - Canonical product URL
/// * `partial` - Best-effort extraction result
/// * `timestamp` - Capture time
pub fn assemble(
    retailer: &Retailer,
    url: &Url,
    partial: PartialRecord,
    timestamp: DateTime<Utc>,
) -> ProductRecord {
    let sku = partial.sku.or_else(|| sku_from_url(retailer, url));

    ProductRecord {
        store: retailer.store().clone(),
        url: url.clone(),
        title: partial.title.unwrap_or_default(),
        sku,
        price: partial.price,
        price_raw: partial.price_raw,
        currency: partial
            .currency
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        in_stock: partial.in_stock,
        image_url: partial.image_url,
        timestamp,
    }
}
