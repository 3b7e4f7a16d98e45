//! Field extraction over a fetched page
//!
//! Runs every field's ordered strategy list against one [`Page`] and records which
//! strategies were tried. Extraction is pure: the same page content always yields the
//! same partial record and trace.

use super::strategy::{Field, Strategy, StrategyTrace};
use crate::normalize::parse_price;
use crate::page::{find_product, first_offer, value_text, Page};
use crate::retailer::Retailer;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, trace};
use url::Url;

/// Currency assumed when no strategy names one
pub const DEFAULT_CURRENCY: &str = "MXN";

const OUT_OF_STOCK_MARKERS: &[&str] = &["agotado", "sin existencias"];
const IN_STOCK_MARKERS: &[&str] = &["agregar al carrito", "añadir al carrito"];

static RAW_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""price"\s*:\s*"?([\d.,]+)"?"#).expect("raw price pattern is valid")
});

static NUMERIC_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{5,}").expect("numeric segment pattern is valid"));

/// Best-effort extraction result; every field may be missing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialRecord {
    pub title: Option<String>,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub price_raw: Option<String>,
    pub currency: Option<String>,
    pub in_stock: Option<bool>,
    pub image_url: Option<String>,
}

/// A partial record together with the strategies that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub record: PartialRecord,
    pub trace: Vec<StrategyTrace>,
}

impl Extraction {
    /// Price is the only field whose absence warrants a rendered re-fetch
    pub fn needs_rendering(&self) -> bool {
        self.record.price.is_none()
    }

    /// Strategies that resolved their field
    pub fn hits(&self) -> impl Iterator<Item = &StrategyTrace> {
        self.trace.iter().filter(|t| t.hit)
    }
}

struct Context<'a> {
    retailer: &'a Retailer,
    page: &'a Page,
    product: Option<&'a Value>,
    offer: Option<&'a Value>,
}

struct PriceHit {
    price: Decimal,
    raw: Option<String>,
}

/// Extracts every field of a product page
///
/// # Arguments
///
/// * `retailer` - The retailer row supplying selectors and URL patterns
/// * `page` - The fetched product page
///
/// # Returns
///
/// The partial record and the ordered trace of strategies tried. Malformed structured
/// data never surfaces here: strategies depending on it simply miss.
pub fn extract_fields(retailer: &Retailer, page: &Page) -> Extraction {
    let product = find_product(page.structured());
    let ctx = Context {
        retailer,
        page,
        product,
        offer: product.and_then(first_offer),
    };

    let mut trace = Vec::new();

    let title = resolve(&ctx, Field::Title, &mut trace, title_by);
    let price = resolve(&ctx, Field::Price, &mut trace, price_by);
    let sku = resolve(&ctx, Field::Sku, &mut trace, sku_by);
    let currency = resolve(&ctx, Field::Currency, &mut trace, currency_by);
    let in_stock = resolve(&ctx, Field::Stock, &mut trace, stock_by);
    let image_url = resolve(&ctx, Field::Image, &mut trace, image_by);

    let (price, price_raw) = match price {
        Some(hit) => (Some(hit.price), hit.raw),
        None => (None, None),
    };

    Extraction {
        record: PartialRecord {
            title,
            sku,
            price,
            price_raw,
            currency,
            in_stock,
            image_url,
        },
        trace,
    }
}

fn resolve<T>(
    ctx: &Context<'_>,
    field: Field,
    trace_log: &mut Vec<StrategyTrace>,
    run: fn(&Context<'_>, Strategy) -> Option<T>,
) -> Option<T> {
    for &strategy in field.strategies() {
        let value = run(ctx, strategy);
        let hit = value.is_some();

        trace_log.push(StrategyTrace {
            field,
            strategy,
            hit,
        });

        if hit {
            debug!(url = %ctx.page.url(), "{:?} resolved by {}", field, strategy);
            return value;
        }
        trace!(url = %ctx.page.url(), "{:?} missed by {}", field, strategy);
    }

    None
}

fn title_by(ctx: &Context<'_>, strategy: Strategy) -> Option<String> {
    match strategy {
        Strategy::Heading => ctx.page.element_text("h1"),
        Strategy::TitleMeta => ctx.page.meta_content("og:title"),
        Strategy::StructuredName => ctx.product.and_then(|p| value_text(p, "name")),
        _ => None,
    }
}

fn price_by(ctx: &Context<'_>, strategy: Strategy) -> Option<PriceHit> {
    match strategy {
        Strategy::PriceSelectors => ctx.retailer.price_selectors.iter().find_map(|spec| {
            let raw = spec.joined_text(ctx.page.document())?;
            let price = parse_price(&raw)?;
            Some(PriceHit {
                price,
                raw: Some(raw),
            })
        }),
        Strategy::StructuredPrice => {
            let offer = ctx.offer?;
            let text = value_text(offer, "price").or_else(|| value_text(offer, "lowPrice"))?;
            parse_price(&text).map(|price| PriceHit { price, raw: None })
        }
        Strategy::RawPriceScan => RAW_PRICE
            .captures_iter(ctx.page.body())
            .filter_map(|caps| caps.get(1))
            .find_map(|m| parse_price(m.as_str()))
            .map(|price| PriceHit { price, raw: None }),
        _ => None,
    }
}

fn sku_by(ctx: &Context<'_>, strategy: Strategy) -> Option<String> {
    match strategy {
        Strategy::SkuSelectors => ctx.page.first_value(&ctx.retailer.sku_selectors),
        Strategy::StructuredSku => {
            let product = ctx.product?;
            ["sku", "productID", "mpn"]
                .iter()
                .find_map(|key| value_text(product, key))
        }
        Strategy::UrlSku => sku_from_url(ctx.retailer, ctx.page.url()),
        _ => None,
    }
}

fn currency_by(ctx: &Context<'_>, strategy: Strategy) -> Option<String> {
    match strategy {
        Strategy::CurrencySelectors => ctx
            .page
            .first_value(&ctx.retailer.currency_selectors)
            .map(|c| c.to_uppercase()),
        Strategy::StructuredCurrency => ctx
            .offer
            .and_then(|o| value_text(o, "priceCurrency"))
            .map(|c| c.to_uppercase()),
        Strategy::DefaultCurrency => Some(DEFAULT_CURRENCY.to_string()),
        _ => None,
    }
}

fn stock_by(ctx: &Context<'_>, strategy: Strategy) -> Option<bool> {
    match strategy {
        Strategy::StockMarkers => {
            let document = ctx.page.document();
            ctx.retailer
                .stock_selectors
                .iter()
                .any(|spec| spec.matches(document))
                .then_some(true)
        }
        Strategy::StockText => stock_from_text(&ctx.page.lowercase_text()),
        Strategy::StructuredAvailability => {
            let availability = ctx.offer.and_then(|o| value_text(o, "availability"))?;
            if availability.contains("OutOfStock") || availability.contains("SoldOut") {
                Some(false)
            } else if availability.contains("InStock") {
                Some(true)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn stock_from_text(text: &str) -> Option<bool> {
    if OUT_OF_STOCK_MARKERS.iter().any(|m| text.contains(m)) {
        Some(false)
    } else if IN_STOCK_MARKERS.iter().any(|m| text.contains(m)) {
        Some(true)
    } else {
        None
    }
}

fn image_by(ctx: &Context<'_>, strategy: Strategy) -> Option<String> {
    let raw = match strategy {
        Strategy::ImageMeta => ctx.page.meta_content("og:image"),
        Strategy::ImageSelectors => ctx.page.first_value(&ctx.retailer.image_selectors),
        _ => None,
    }?;

    ctx.page.url().join(&raw).ok().map(|u| u.to_string())
}

/// Derives a SKU from the numeric segment of a product URL path
///
/// The retailer's SKU patterns are tried first (capture group 1); otherwise the last run of
/// five or more digits in the path is used.
///
/// # Examples
///
/// ```
/// use shelf_tracker::extract::sku_from_url;
/// use shelf_tracker::retailer::RetailerTable;
/// use url::Url;
///
/// let table = RetailerTable::build(&[]).unwrap();
/// let soriana = table.get("soriana").unwrap();
/// let url = Url::parse("https://www.soriana.com/harina-de-trigo-1kg/1234567.html").unwrap();
/// assert_eq!(sku_from_url(&soriana, &url), Some("1234567".to_string()));
/// ```
pub fn sku_from_url(retailer: &Retailer, url: &Url) -> Option<String> {
    let path = url.path();

    retailer
        .sku_url_patterns
        .iter()
        .find_map(|pattern| pattern.captures(path)?.get(1).map(|m| m.as_str().to_string()))
        .or_else(|| {
            NUMERIC_SEGMENT
                .find_iter(path)
                .last()
                .map(|m| m.as_str().to_string())
        })
}
