//! Listing walker
//!
//! Enumerates candidate product URLs on a listing page and computes the next listing page.
//! Both operations are pure functions over a parsed [`Page`](crate::page::Page); the
//! session-level stopping policy lives in [`CrawlSession`](crate::state::CrawlSession).

mod links;
mod pagination;

pub use links::{extract_candidate_links, is_product_url};
pub use pagination::{find_next_page, increment_page_param};
