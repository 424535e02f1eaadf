//! OpenGraph / Twitter card / document-title layer.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use dealfeed_common::ExtractedProduct;

use super::{image, prices};

static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid regex"));
static LINK_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("valid regex"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z0-9:_-]+)\s*=\s*["']([^"']*)["']"#).expect("valid regex")
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));

pub(crate) fn apply(product: &mut ExtractedProduct, html: &str, base_url: &str, major: bool) {
    let meta = meta_map(html);
    let get = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .find_map(|k| meta.get(*k))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if product.title.is_none() {
        product.title = get(&["og:title", "twitter:title"]).or_else(|| {
            TITLE_RE
                .captures(html)
                .map(|c| c[1].trim().to_string())
                .filter(|t| !t.is_empty())
        });
    }

    if product.description.is_none() {
        product.description = get(&["og:description", "twitter:description", "description"]);
    }

    if product.image_url.is_none() {
        let candidate = get(&["og:image:secure_url", "og:image", "twitter:image"])
            .or_else(|| link_image_src(html));
        product.image_url = candidate.and_then(|c| image::sanitize(&c, base_url));
    }

    // Meta price hints are only trusted on generic storefronts; marketplace
    // pages get their prices from the platform layer.
    if !major && product.price.is_none() {
        if let Some(amount) = get(&["og:price:amount", "product:price:amount"]) {
            product.price = prices::clean_display(&amount);
            if product.currency.is_none() {
                product.currency = get(&["og:price:currency", "product:price:currency"]);
            }
        }
    }
}

/// All meta tags as property/name -> content, first occurrence wins.
fn meta_map(html: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for tag in META_TAG_RE.find_iter(html) {
        let mut key = None;
        let mut content = None;
        for attr in ATTR_RE.captures_iter(tag.as_str()) {
            let name = attr[1].to_lowercase();
            match name.as_str() {
                "property" | "name" | "itemprop" => key = Some(attr[2].to_lowercase()),
                "content" => content = Some(attr[2].to_string()),
                _ => {}
            }
        }
        if let (Some(k), Some(c)) = (key, content) {
            map.entry(k).or_insert(c);
        }
    }
    map
}

fn link_image_src(html: &str) -> Option<String> {
    for tag in LINK_TAG_RE.find_iter(html) {
        let mut rel = None;
        let mut href = None;
        for attr in ATTR_RE.captures_iter(tag.as_str()) {
            match attr[1].to_lowercase().as_str() {
                "rel" => rel = Some(attr[2].to_lowercase()),
                "href" => href = Some(attr[2].to_string()),
                _ => {}
            }
        }
        if rel.as_deref() == Some("image_src") {
            return href;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://shop.example/p/1";

    #[test]
    fn reads_og_tags_in_any_attribute_order() {
        let html = r#"
            <meta property="og:title" content="Widget Pro" />
            <meta content="A fine widget" property="og:description">
            <meta name="twitter:image" content="https://cdn.example/widget.jpg">
        "#;
        let mut p = ExtractedProduct::default();
        apply(&mut p, html, BASE, false);
        assert_eq!(p.title.as_deref(), Some("Widget Pro"));
        assert_eq!(p.description.as_deref(), Some("A fine widget"));
        assert_eq!(p.image_url.as_deref(), Some("https://cdn.example/widget.jpg"));
    }

    #[test]
    fn document_title_is_the_last_resort() {
        let html = "<html><head><title>Fancy Kettle - Shop</title></head></html>";
        let mut p = ExtractedProduct::default();
        apply(&mut p, html, BASE, false);
        assert_eq!(p.title.as_deref(), Some("Fancy Kettle - Shop"));
    }

    #[test]
    fn og_price_fills_generic_hosts_only() {
        let html = r#"
            <meta property="og:price:amount" content="1299.00">
            <meta property="og:price:currency" content="INR">
        "#;
        let mut generic = ExtractedProduct::default();
        apply(&mut generic, html, BASE, false);
        assert_eq!(generic.price.as_deref(), Some("1299.00"));
        assert_eq!(generic.currency.as_deref(), Some("INR"));

        let mut marketplace = ExtractedProduct::default();
        apply(&mut marketplace, html, BASE, true);
        assert_eq!(marketplace.price, None);
    }

    #[test]
    fn existing_fields_are_not_overwritten() {
        let html = r#"<meta property="og:title" content="From Meta">"#;
        let mut p = ExtractedProduct {
            title: Some("From JSON-LD".into()),
            ..Default::default()
        };
        apply(&mut p, html, BASE, false);
        assert_eq!(p.title.as_deref(), Some("From JSON-LD"));
    }

    #[test]
    fn bad_og_image_is_rejected() {
        let html = r#"<meta property="og:image" content="https://cdn.example/site-logo.png">"#;
        let mut p = ExtractedProduct::default();
        apply(&mut p, html, BASE, false);
        assert_eq!(p.image_url, None);
    }
}
