//! Last-resort price recovery for generic storefronts: Shopify theme
//! markup first, then a whole-document scan that filters out coupon and
//! shipping noise.

use std::sync::LazyLock;

use regex::Regex;

use dealfeed_common::ExtractedProduct;

use super::prices;

/// An "original" price more than this many times the selling price is a
/// scrape artifact (catalog totals, bundle prices), not an MRP.
pub const MAX_ORIGINAL_PRICE_RATIO: f64 = 6.0;

/// Shopify JSON embeds prices in paise. Anything at or above this after
/// the cheaper layers ran is treated as a minor-unit amount.
pub const MINOR_UNIT_THRESHOLD: f64 = 10_000.0;

const AMT: &str = r"([\d,]+(?:\.\d+)?)";

// --- Shopify theme markup ---

static SHOPIFY_SALE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?is)class=["'][^"']*(?:price-item--sale|price__sale)[^"']*["'][^>]*>[^0-9₹]*₹?\s*{AMT}"#
    ))
    .expect("valid regex")
});
static SHOPIFY_REGULAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?is)class=["'][^"']*(?:price-item--regular|price__regular|price__compare|compare-at)[^"']*["'][^>]*>[^0-9₹]*₹?\s*{AMT}"#
    ))
    .expect("valid regex")
});
static DEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?is)<del[^>]*>[^0-9₹]*₹?\s*{AMT}"))
        .expect("valid regex")
});
static SHOPIFY_JSON_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""price"\s*:\s*"?(\d+(?:\.\d+)?)"#).expect("valid regex"));
static SHOPIFY_JSON_COMPARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""compare_at_price"\s*:\s*"?(\d+(?:\.\d+)?)"#).expect("valid regex")
});
static SHOPIFY_CONTEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:cdn\.shopify|shopify|"variants"\s*:|"product"\s*:)"#)
        .expect("valid regex")
});

// --- generic scan ---

static RUPEE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?:₹|Rs\.?)\s*{AMT}")).expect("valid regex")
});
static CURRENCY_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i){AMT}\s*(?:INR|Rs\.?)\b")).expect("valid regex")
});
// Quoted-key forms ("price": 149900) belong to the Shopify JSON layer,
// which is context-gated; the generic label scan must not pick them up.
static PRICE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?is)(?:^|[^"\w])(?:price|mrp|deal|offer|only|now)[^0-9"]{{0,60}}{AMT}"#
    ))
    .expect("valid regex")
});
static PRICE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?is)class=["'][^"']*price[^"']*["'].{{0,80}}?{AMT}"#
    ))
    .expect("valid regex")
});

/// Words that mark a number as something other than a selling price.
static NOISE_CONTEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:off|save|coupon|discount|cashback|extra|flat|code|promo|voucher|emi|tax|delivery|shipping|rating|review|catalog|wholesale)\b",
    )
    .expect("valid regex")
});

const CONTEXT_RADIUS: usize = 120;

pub(crate) fn apply(product: &mut ExtractedProduct, html: &str) {
    if product.price.is_none() {
        shopify(product, html);
    }
    if product.price.is_none() {
        generic_scan(product, html);
    }
}

fn shopify(product: &mut ExtractedProduct, html: &str) {
    if let Some(sale) = SHOPIFY_SALE_RE
        .captures(html)
        .and_then(|c| prices::clean_display(&c[1]))
    {
        product.price = Some(sale);
        if product.original_price.is_none() {
            product.original_price = SHOPIFY_REGULAR_RE
                .captures(html)
                .or_else(|| DEL_RE.captures(html))
                .and_then(|c| prices::clean_display(&c[1]));
        }
        return;
    }

    // Theme JSON carries numeric prices, only trusted on pages that are
    // recognizably Shopify product markup.
    if SHOPIFY_CONTEXT_RE.is_match(html) {
        if let Some(price) = SHOPIFY_JSON_PRICE_RE
            .captures(html)
            .and_then(|c| prices::clean_display(&c[1]))
        {
            product.price = Some(price);
            if product.original_price.is_none() {
                product.original_price = SHOPIFY_JSON_COMPARE_RE
                    .captures(html)
                    .and_then(|c| prices::clean_display(&c[1]));
            }
        }
    }
}

fn generic_scan(product: &mut ExtractedProduct, html: &str) {
    let mut values: Vec<f64> = Vec::new();
    for re in [
        &*RUPEE_PREFIX_RE,
        &*CURRENCY_SUFFIX_RE,
        &*PRICE_LABEL_RE,
        &*PRICE_CLASS_RE,
    ] {
        for caps in re.captures_iter(html) {
            let Some(m) = caps.get(1) else { continue };
            if noisy_context(html, m.start(), m.end()) {
                continue;
            }
            if let Some(v) = prices::price_value(m.as_str()) {
                values.push(v);
            }
        }
    }

    let mut pool: Vec<f64> = values.iter().copied().filter(|v| *v >= 50.0).collect();
    if pool.is_empty() {
        pool = values.into_iter().filter(|v| *v >= 10.0).collect();
    }
    if pool.is_empty() {
        return;
    }

    // Busy listing pages repeat the real price many times; take the most
    // frequent value there, the smallest plausible one otherwise.
    let price = if pool.len() >= 10 {
        mode(&pool)
    } else {
        pool.iter().copied().fold(f64::INFINITY, f64::min)
    };
    product.price = Some(prices::format_display(price));

    let mut distinct: Vec<f64> = pool.clone();
    distinct.sort_by(|a, b| a.total_cmp(b));
    distinct.dedup();
    if distinct.len() < 2 {
        return;
    }

    let max = distinct[distinct.len() - 1];
    let original = if max > price && max / price <= MAX_ORIGINAL_PRICE_RATIO {
        Some(max)
    } else {
        // The maximum is implausible; settle for the next value above the
        // selling price that still looks like an MRP.
        distinct
            .iter()
            .copied()
            .find(|v| *v > price && *v / price <= MAX_ORIGINAL_PRICE_RATIO)
    };
    product.original_price = original.map(prices::format_display);
}

fn noisy_context(html: &str, start: usize, end: usize) -> bool {
    let from = floor_char_boundary(html, start.saturating_sub(CONTEXT_RADIUS));
    let to = ceil_char_boundary(html, (end + CONTEXT_RADIUS).min(html.len()));
    NOISE_CONTEXT_RE.is_match(&html[from..to])
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

fn mode(values: &[f64]) -> f64 {
    let mut best = values[0];
    let mut best_count = 0usize;
    for v in values {
        let count = values.iter().filter(|o| (*o - v).abs() < f64::EPSILON).count();
        if count > best_count {
            best_count = count;
            best = *v;
        }
    }
    best
}

/// Shopify and friends serve prices in paise. Runs after every layer so a
/// minor-unit amount is corrected no matter which layer produced it.
pub(crate) fn normalize_minor_units(product: &mut ExtractedProduct) {
    for field in [&mut product.price, &mut product.original_price] {
        if let Some(display) = field.as_deref() {
            if let Some(v) = prices::price_value(display) {
                if v >= MINOR_UNIT_THRESHOLD {
                    *field = Some(prices::format_display((v / 100.0).round()));
                }
            }
        }
    }
}
