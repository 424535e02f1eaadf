//! JSON-LD layer: `application/ld+json` blocks carry canonical product
//! data on most storefronts.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use dealfeed_common::ExtractedProduct;

use super::{image, prices};

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

pub(crate) fn apply(product: &mut ExtractedProduct, html: &str, base_url: &str, major: bool) {
    for caps in SCRIPT_RE.captures_iter(html) {
        let Ok(parsed) = serde_json::from_str::<Value>(caps[1].trim()) else {
            continue;
        };
        if let Some(obj) = find_product(&parsed) {
            fill(product, obj, base_url, major);
            return;
        }
    }
}

/// Walk top-level values, arrays, and @graph collections for the first
/// object that looks like a product.
fn find_product(value: &Value) -> Option<&Value> {
    let candidates: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => match obj.get("@graph").and_then(Value::as_array) {
            Some(graph) => graph.iter().collect(),
            None => vec![value],
        },
        _ => return None,
    };
    candidates.into_iter().find(|c| looks_like_product(c))
}

fn looks_like_product(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let typed_product = match obj.get("@type") {
        Some(Value::String(t)) => t.to_lowercase().contains("product"),
        Some(Value::Array(ts)) => ts
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t.to_lowercase().contains("product")),
        _ => false,
    };
    typed_product || obj.contains_key("offers") || (obj.contains_key("name") && obj.contains_key("image"))
}

fn fill(product: &mut ExtractedProduct, obj: &Value, base_url: &str, major: bool) {
    if product.title.is_none() {
        product.title = obj
            .get("name")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }
    if product.description.is_none() {
        product.description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }
    if product.image_url.is_none() {
        product.image_url = image_candidate(obj.get("image"))
            .and_then(|c| image::sanitize(&c, base_url));
    }

    // Marketplace prices come from the platform layer; see extract().
    if major {
        return;
    }

    let offer = match obj.get("offers") {
        Some(Value::Array(offers)) => offers.first(),
        Some(offer) => Some(offer),
        None => None,
    };
    let Some(offer) = offer else { return };

    if product.price.is_none() {
        let raw = offer
            .get("price")
            .or_else(|| offer.get("priceSpecification").and_then(|s| s.get("price")))
            .or_else(|| offer.get("lowPrice"));
        if let Some(display) = raw.and_then(scalar_display) {
            product.price = Some(display);
        }
    }
    if product.original_price.is_none() {
        let raw = offer
            .get("priceSpecification")
            .and_then(|s| s.get("referencePrice"))
            .or_else(|| offer.get("listPrice"));
        if let Some(display) = raw.and_then(scalar_display) {
            product.original_price = Some(display);
        }
    }
    if product.currency.is_none() {
        product.currency = offer
            .get("priceCurrency")
            .or_else(|| {
                offer
                    .get("priceSpecification")
                    .and_then(|s| s.get("priceCurrency"))
            })
            .and_then(Value::as_str)
            .map(String::from);
    }
}

/// image can be a string, an array of strings, or an ImageObject.
fn image_candidate(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find(|s| s.starts_with("http"))
            .map(String::from),
        Value::Object(obj) => obj.get("url").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

fn scalar_display(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => prices::clean_display(s),
        Value::Number(n) => Some(prices::format_display(n.as_f64()?)),
        _ => None,
    }
}
