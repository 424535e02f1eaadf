//! Marketplace-specific selectors. Amazon, Flipkart, and Myntra render
//! product data in stable id/class hooks that beat any generic heuristic.

use std::sync::LazyLock;

use regex::Regex;

use dealfeed_common::ExtractedProduct;

use super::{image, prices};

/// Amounts below this inside Amazon price blocks are coupon chips and
/// savings badges, not the product price.
const AMAZON_MIN_PLAUSIBLE_PRICE: f64 = 1000.0;

const AMT: &str = r"([\d,]+(?:\.\d+)?)";

macro_rules! rupee_re {
    ($name:ident, $prefix:literal) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(&format!(
                concat!($prefix, r"\s*₹?[\s\x{{A0}}]*{}"),
                AMT
            ))
            .expect("valid regex")
        });
    };
}

// --- Amazon ---

static AMZ_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<span[^>]+id=["']productTitle["'][^>]*>([^<]+)</span>"#)
        .expect("valid regex")
});
rupee_re!(
    AMZ_PRICE_CORE_RE,
    r#"(?is)id=["']corePrice_desktop["'].*?class=["']a-offscreen["'][^>]*>"#
);
rupee_re!(
    AMZ_PRICE_RE,
    r#"(?is)class=["']a-price[^"']*["'].*?class=["']a-offscreen["'][^>]*>"#
);
rupee_re!(
    AMZ_ORIGINAL_RE,
    r#"(?is)class=["']a-price\s+a-text-price[^"']*["'].*?class=["']a-offscreen["'][^>]*>"#
);
rupee_re!(AMZ_STRIKE_RE, r#"(?is)class=["']a-text-strike["'][^>]*>"#);
static AMZ_HIRES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""hiRes"\s*:\s*"(https?:[^"]+)""#).expect("valid regex"));
static AMZ_LANDING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<img[^>]+id=["']landingImage["'][^>]+(?:src|data-old-hires)=["']([^"']+)["']"#)
        .expect("valid regex")
});
static AMZ_DYNAMIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-a-dynamic-image=["'](\{[^"']+\})["']"#).expect("valid regex")
});

// --- Flipkart ---

static FK_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<span[^>]+class=["']B_NuCI["'][^>]*>([^<]+)</span>"#).expect("valid regex")
});
rupee_re!(FK_PRICE_RE, r#"(?is)class=["']_30jeq3[^"']*["'][^>]*>"#);
rupee_re!(FK_ORIGINAL_RE, r#"(?is)class=["']_3I9_wc[^"']*["'][^>]*>"#);
static FK_INLINE_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:sellingPrice|price)"\s*:\s*"?([\d,.]+)"?"#).expect("valid regex")
});
static FK_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<img[^>]+class=["']_396cs4[^"']*["'][^>]*src=["']([^"']+)["']"#)
        .expect("valid regex")
});

// --- Myntra ---

static MY_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<h1[^>]+class=["']pdp-(?:title|name)["'][^>]*>([^<]+)</h1>"#)
        .expect("valid regex")
});
// Myntra nests the amount in inner tags and prefixes the MRP with label
// text, so the amount is not directly after the element's `>`.
rupee_re!(
    MY_PRICE_RE,
    r#"(?is)class=["']pdp-(?:discount-)?price[^"']*["'][^>]*>.*?"#
);
rupee_re!(MY_ORIGINAL_RE, r#"(?is)class=["']pdp-mrp[^"']*["'][^>]*>.*?"#);

pub fn is_major_marketplace(hostname: &str) -> bool {
    hostname.contains("amazon.") || hostname.contains("flipkart.") || hostname.contains("myntra.")
}

pub(crate) fn apply(product: &mut ExtractedProduct, html: &str, hostname: &str, base_url: &str) {
    if hostname.contains("amazon.") {
        amazon(product, html, base_url);
    } else if hostname.contains("flipkart.") {
        flipkart(product, html, base_url);
    } else if hostname.contains("myntra.") {
        myntra(product, html);
    }
    if product.price.is_some() || product.original_price.is_some() {
        product.currency.get_or_insert_with(|| "INR".to_string());
    }
}

fn capture(re: &Regex, html: &str) -> Option<String> {
    re.captures(html).map(|c| c[1].trim().to_string()).filter(|s| !s.is_empty())
}

fn amazon(product: &mut ExtractedProduct, html: &str, base_url: &str) {
    if product.title.is_none() {
        product.title = capture(&AMZ_TITLE_RE, html);
    }

    if product.price.is_none() {
        let raw = capture(&AMZ_PRICE_CORE_RE, html).or_else(|| capture(&AMZ_PRICE_RE, html));
        product.price = raw.and_then(|r| prices::clean_display(&r)).filter(|p| {
            prices::price_value(p).is_some_and(|v| v >= AMAZON_MIN_PLAUSIBLE_PRICE)
        });
    }
    if product.original_price.is_none() {
        let raw = capture(&AMZ_ORIGINAL_RE, html).or_else(|| capture(&AMZ_STRIKE_RE, html));
        product.original_price = raw.and_then(|r| prices::clean_display(&r));
    }

    if product.image_url.is_none() {
        let candidate = capture(&AMZ_HIRES_RE, html)
            .or_else(|| capture(&AMZ_LANDING_RE, html))
            .or_else(|| dynamic_image(html));
        product.image_url = candidate.and_then(|c| image::sanitize(&c, base_url));
    }
}

/// data-a-dynamic-image holds an HTML-escaped JSON map keyed by image URL.
fn dynamic_image(html: &str) -> Option<String> {
    let raw = capture(&AMZ_DYNAMIC_RE, html)?;
    let decoded = raw.replace("&quot;", "\"");
    let map: serde_json::Value = serde_json::from_str(&decoded).ok()?;
    map.as_object()?
        .keys()
        .find(|k| k.starts_with("http"))
        .cloned()
}

fn flipkart(product: &mut ExtractedProduct, html: &str, base_url: &str) {
    if product.title.is_none() {
        product.title = capture(&FK_TITLE_RE, html);
    }
    if product.price.is_none() {
        product.price = capture(&FK_PRICE_RE, html)
            .or_else(|| capture(&FK_INLINE_PRICE_RE, html))
            .and_then(|r| prices::clean_display(&r));
    }
    if product.original_price.is_none() {
        product.original_price =
            capture(&FK_ORIGINAL_RE, html).and_then(|r| prices::clean_display(&r));
    }
    if product.image_url.is_none() {
        product.image_url =
            capture(&FK_IMAGE_RE, html).and_then(|c| image::sanitize(&c, base_url));
    }
}

fn myntra(product: &mut ExtractedProduct, html: &str) {
    if product.title.is_none() {
        product.title = capture(&MY_TITLE_RE, html);
    }
    if product.price.is_none() {
        product.price = capture(&MY_PRICE_RE, html).and_then(|r| prices::clean_display(&r));
    }
    if product.original_price.is_none() {
        product.original_price =
            capture(&MY_ORIGINAL_RE, html).and_then(|r| prices::clean_display(&r));
    }
}
