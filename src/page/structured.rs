//! Embedded JSON-LD blocks
//!
//! Blocks are parsed as generic `serde_json::Value` trees. A block that fails to parse is
//! never an error: it is repaired once (concatenated objects wrapped in an array) and
//! otherwise skipped.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::trace;

/// Parses every `<script type="application/ld+json">` block of a document
///
/// Top-level arrays and `@graph` containers are flattened, so the result is a flat list of
/// JSON-LD nodes in document order.
pub fn parse_json_ld(document: &Html) -> Vec<Value> {
    let selector = match Selector::parse(r#"script[type="application/ld+json"]"#) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut nodes = Vec::new();
    for script in document.select(&selector) {
        let raw = script.text().collect::<String>();
        if let Some(value) = parse_json_ld_block(&raw) {
            flatten_into(value, &mut nodes);
        }
    }

    nodes
}

/// Parses one JSON-LD block, repairing concatenated objects (`{...}{...}`)
pub fn parse_json_ld_block(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            if raw.contains("}{") {
                let repaired = format!("[{}]", raw.replace("}{", "},{"));
                if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
                    trace!("Repaired concatenated JSON-LD block");
                    return Some(value);
                }
            }
            trace!("Skipping malformed JSON-LD block: {}", err);
            None
        }
    }
}

fn flatten_into(value: Value, nodes: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, nodes);
            }
        }
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_into(graph, nodes);
                if map.keys().any(|k| k != "@context") {
                    nodes.push(Value::Object(map));
                }
            } else {
                nodes.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

/// Picks the product node: the first node typed `Product`, else the first untyped node
/// carrying `offers`
///
/// Nodes of any other type (`Organization`, `WebSite`, `BreadcrumbList`) never stand in
/// for the product.
pub fn find_product(nodes: &[Value]) -> Option<&Value> {
    nodes
        .iter()
        .find(|node| is_product(node))
        .or_else(|| {
            nodes
                .iter()
                .find(|node| node.get("@type").is_none() && node.get("offers").is_some())
        })
}

fn is_product(node: &Value) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case("Product"),
        Some(Value::Array(types)) => types
            .iter()
            .any(|t| t.as_str().is_some_and(|t| t.eq_ignore_ascii_case("Product"))),
        _ => false,
    }
}

/// Returns the product's offer: `offers` itself when it is an object, its first element
/// when it is a list
pub fn first_offer(product: &Value) -> Option<&Value> {
    match product.get("offers")? {
        Value::Array(offers) => offers.iter().find(|o| o.is_object()),
        offer @ Value::Object(_) => Some(offer),
        _ => None,
    }
}

/// Reads a scalar field as trimmed text; numbers are rendered as written
pub fn value_text(node: &Value, key: &str) -> Option<String> {
    let text = match node.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
