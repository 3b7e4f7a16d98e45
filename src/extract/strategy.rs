//! Ordered extraction strategies
//!
//! Each field has a fixed, ordered list of strategies; the first one yielding a non-empty
//! value wins. The lists are data so that precedence can be read, tested and extended
//! without touching the extraction loop.

use std::fmt;

/// A product record field resolved by extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Price,
    Sku,
    Currency,
    Stock,
    Image,
}

impl Field {
    /// All fields, in the order they are extracted
    pub const ALL: [Field; 6] = [
        Field::Title,
        Field::Price,
        Field::Sku,
        Field::Currency,
        Field::Stock,
        Field::Image,
    ];

    /// The ordered strategy list for this field
    pub fn strategies(self) -> &'static [Strategy] {
        match self {
            Field::Title => TITLE_STRATEGIES,
            Field::Price => PRICE_STRATEGIES,
            Field::Sku => SKU_STRATEGIES,
            Field::Currency => CURRENCY_STRATEGIES,
            Field::Stock => STOCK_STRATEGIES,
            Field::Image => IMAGE_STRATEGIES,
        }
    }
}

/// A single way of resolving one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Text of the page heading (`h1`)
    Heading,
    /// `og:title` meta tag
    TitleMeta,
    /// JSON-LD product `name`
    StructuredName,

    /// Retailer price selectors
    PriceSelectors,
    /// JSON-LD `offers.price` (or `offers.lowPrice`)
    StructuredPrice,
    /// Regex scan of the raw body for a JSON `"price"` field
    RawPriceScan,

    /// Retailer SKU selectors
    SkuSelectors,
    /// JSON-LD `sku`, `productID` or `mpn`
    StructuredSku,
    /// Numeric segment of the product URL path
    UrlSku,

    /// Retailer currency selectors
    CurrencySelectors,
    /// JSON-LD `offers.priceCurrency`
    StructuredCurrency,
    /// The default currency
    DefaultCurrency,

    /// Any retailer in-stock marker element present
    StockMarkers,
    /// Add-to-cart or sold-out phrases in the page text
    StockText,
    /// JSON-LD `offers.availability`
    StructuredAvailability,

    /// `og:image` meta tag
    ImageMeta,
    /// Retailer image selectors
    ImageSelectors,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Heading => "heading",
            Strategy::TitleMeta => "title_meta",
            Strategy::StructuredName => "structured_name",
            Strategy::PriceSelectors => "price_selectors",
            Strategy::StructuredPrice => "structured_price",
            Strategy::RawPriceScan => "raw_price_scan",
            Strategy::SkuSelectors => "sku_selectors",
            Strategy::StructuredSku => "structured_sku",
            Strategy::UrlSku => "url_sku",
            Strategy::CurrencySelectors => "currency_selectors",
            Strategy::StructuredCurrency => "structured_currency",
            Strategy::DefaultCurrency => "default_currency",
            Strategy::StockMarkers => "stock_markers",
            Strategy::StockText => "stock_text",
            Strategy::StructuredAvailability => "structured_availability",
            Strategy::ImageMeta => "image_meta",
            Strategy::ImageSelectors => "image_selectors",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

pub const TITLE_STRATEGIES: &[Strategy] = &[
    Strategy::Heading,
    Strategy::TitleMeta,
    Strategy::StructuredName,
];

pub const PRICE_STRATEGIES: &[Strategy] = &[
    Strategy::PriceSelectors,
    Strategy::StructuredPrice,
    Strategy::RawPriceScan,
];

pub const SKU_STRATEGIES: &[Strategy] = &[
    Strategy::SkuSelectors,
    Strategy::StructuredSku,
    Strategy::UrlSku,
];

pub const CURRENCY_STRATEGIES: &[Strategy] = &[
    Strategy::CurrencySelectors,
    Strategy::StructuredCurrency,
    Strategy::DefaultCurrency,
];

pub const STOCK_STRATEGIES: &[Strategy] = &[
    Strategy::StockMarkers,
    Strategy::StockText,
    Strategy::StructuredAvailability,
];

pub const IMAGE_STRATEGIES: &[Strategy] = &[Strategy::ImageMeta, Strategy::ImageSelectors];

/// Outcome of one strategy during one extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyTrace {
    pub field: Field,
    pub strategy: Strategy,
    pub hit: bool,
}
