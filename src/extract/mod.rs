//! Field extraction
//!
//! Produces a best-effort [`PartialRecord`] from a product page by running each field's
//! ordered strategy list (see [`strategy`]).

mod fields;
pub mod strategy;

pub use fields::{extract_fields, sku_from_url, Extraction, PartialRecord, DEFAULT_CURRENCY};
pub use strategy::{Field, Strategy, StrategyTrace};
