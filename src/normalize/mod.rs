//! Numeric and text normalization
//!
//! Pure, infallible helpers shared by the extractor and the listing walker:
//! - Locale-tolerant price parsing (`"1.234,56"`, `"$ 99.00 MXN"`)
//! - Query slugification for retailers that put the search term in the URL path

mod price;
mod slug;

pub use price::parse_price;
pub use slug::{slugify, EMPTY_SLUG};
