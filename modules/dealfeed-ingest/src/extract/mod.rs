//! Layered product extraction. Each layer only fills fields the layers
//! before it left empty: marketplace selectors, then JSON-LD, then meta
//! tags, then the generic heuristics, then the URL path itself.

mod heuristic;
mod image;
mod jsonld;
mod meta;
mod platform;
pub mod prices;
pub mod title;

pub use heuristic::{MAX_ORIGINAL_PRICE_RATIO, MINOR_UNIT_THRESHOLD};
pub use platform::is_major_marketplace;

use dealfeed_common::ExtractedProduct;

pub fn extract(
    html: &str,
    final_url: &str,
    hostname: &str,
    default_currency: &str,
) -> ExtractedProduct {
    let mut product = ExtractedProduct::default();
    let major = platform::is_major_marketplace(hostname);

    if !html.is_empty() {
        if major {
            platform::apply(&mut product, html, hostname, final_url);
        }
        jsonld::apply(&mut product, html, final_url, major);
        meta::apply(&mut product, html, final_url, major);
        if !major {
            heuristic::apply(&mut product, html);
            heuristic::normalize_minor_units(&mut product);
        }
    }

    if product.title.is_none() {
        product.title = title::title_from_path(final_url);
    }

    prices::enforce_order(&mut product);
    if product.price.is_some() && product.currency.is_none() {
        product.currency = Some(default_currency.to_string());
    }
    product
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layers_fill_without_overwriting() {
        let html = r#"
            <script type="application/ld+json">
                { "@type": "Product", "name": "Ceramic Mug" }
            </script>
            <meta property="og:title" content="Ceramic Mug | Shop">
            <meta property="og:description" content="350ml stoneware mug">
            <div class="mug-price">₹349</div>
            <div>MRP ₹499</div>
        "#;
        let p = extract(html, "https://shop.example/p/ceramic-mug", "shop.example", "INR");
        assert_eq!(p.title.as_deref(), Some("Ceramic Mug"));
        assert_eq!(p.description.as_deref(), Some("350ml stoneware mug"));
        assert_eq!(p.price.as_deref(), Some("349"));
        assert_eq!(p.original_price.as_deref(), Some("499"));
        assert_eq!(p.currency.as_deref(), Some("INR"));
    }

    #[test]
    fn empty_body_still_yields_a_path_title() {
        let p = extract(
            "",
            "https://www.amazon.in/sony-wh-1000xm5-headphones/dp/B09XS7JWHH",
            "amazon.in",
            "INR",
        );
        assert_eq!(p.title.as_deref(), Some("sony wh 1000xm5 headphones"));
        assert_eq!(p.price, None);
    }

    #[test]
    fn marketplace_pages_ignore_generic_price_noise() {
        // No a-price block, so the marketplace page yields no price even
        // though the body is full of rupee amounts.
        let html = "<div>Flat ₹500 off</div><div>₹2,499</div>";
        let p = extract(html, "https://www.amazon.in/dp/B0X", "amazon.in", "INR");
        assert_eq!(p.price, None);
    }

    #[test]
    fn marketplace_detection_is_part_of_the_module_surface() {
        assert!(is_major_marketplace("www.amazon.in"));
        assert!(is_major_marketplace("myntra.com"));
        assert!(!is_major_marketplace("shop.example"));
    }

    #[test]
    fn reversed_prices_end_up_ordered() {
        let html = r#"
            <script type="application/ld+json">
                { "@type": "Product", "name": "Trimmer",
                  "offers": { "price": "2999",
                              "priceSpecification": { "referencePrice": "1499" } } }
            </script>
        "#;
        let p = extract(html, "https://shop.example/p/trimmer-kit", "shop.example", "INR");
        assert_eq!(p.price.as_deref(), Some("1499"));
        assert_eq!(p.original_price.as_deref(), Some("2999"));
    }
}
