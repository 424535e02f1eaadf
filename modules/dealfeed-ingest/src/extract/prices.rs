//! Price display helpers shared by the extraction layers and the message
//! parser. Prices are carried as display strings with comma separators
//! ("43,999"); currency travels in its own field.

use std::sync::LazyLock;

use regex::Regex;

use dealfeed_common::ExtractedProduct;

static NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9][0-9,]*(?:\.[0-9]+)?").expect("valid regex"));

/// Pull the numeric display form out of messy span text ("MRP: ₹2,999 " ->
/// "2,999"). Trailing separators from theme markup are dropped.
pub fn clean_display(raw: &str) -> Option<String> {
    let m = NUM_RE.find(raw)?;
    let v = m.as_str().trim_end_matches(['.', ',']);
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

/// Numeric value of a display string. Commas and currency markers ignored.
pub fn price_value(display: &str) -> Option<f64> {
    let digits: String = display
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Format a value back into a display string with Indian digit grouping
/// ("129999" -> "1,29,999").
pub fn format_display(value: f64) -> String {
    let rounded = value.round() as i64;
    let s = rounded.abs().to_string();
    let sign = if rounded < 0 { "-" } else { "" };
    if s.len() <= 3 {
        return format!("{sign}{s}");
    }
    let (head, tail) = s.split_at(s.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut i = head.len();
    while i > 0 {
        let start = i.saturating_sub(2);
        groups.push(&head[start..i]);
        i = start;
    }
    groups.reverse();
    format!("{sign}{},{tail}", groups.join(","))
}

/// Keep price <= original_price: swap when a source lists them reversed,
/// drop the original when they are equal.
pub fn order_pair(
    price: Option<String>,
    original: Option<String>,
) -> (Option<String>, Option<String>) {
    match (price, original) {
        (Some(p), Some(o)) => match (price_value(&p), price_value(&o)) {
            (Some(pv), Some(ov)) if ov < pv => (Some(o), Some(p)),
            (Some(pv), Some(ov)) if ov == pv => (Some(p), None),
            _ => (Some(p), Some(o)),
        },
        pair => pair,
    }
}

pub fn enforce_order(product: &mut ExtractedProduct) {
    let (p, o) = order_pair(product.price.take(), product.original_price.take());
    product.price = p;
    product.original_price = o;
}

/// Percentage saved, rounded; only when the original really is higher.
pub fn discount_percent(price: &str, original: &str) -> Option<i32> {
    let p = price_value(price)?;
    let o = price_value(original)?;
    if o > p && o > 0.0 {
        Some((((o - p) / o) * 100.0).round() as i32)
    } else {
        None
    }
}
