//! Message parsing: pull URLs, per-item titles, prices, and promo codes
//! out of a raw channel post before any page is fetched.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use dealfeed_common::RawMessage;

use crate::extract::prices;
use crate::resolver;

static GENERAL_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("valid regex"));

/// Shortener links are often posted without a scheme ("amzn.to/xyz").
static BARE_SHORTENER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:bit\.ly|tinyurl\.com|goo\.gl|t\.co|amzn\.to|amzn\.in|a\.co|fkrt\.(?:it|cc|co)|dl\.flipkart\.com|cutt\.ly|da\.gd|spoo\.me|bitli\.in|extp\.in|myntr\.it|ajiio\.in|wishlink\.com)/[^\s<>\x22']+",
    )
    .expect("valid regex")
});

static RUPEE_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"₹([\d,]+(?:\.\d+)?)\s*₹([\d,]+(?:\.\d+)?)").expect("valid regex")
});
static RUPEE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)₹([\d,]+(?:\.\d+)?)(k?)").expect("valid regex"));
static DEAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Deal\s*@\s*₹?([\d,]+(?:\.\d+)?)(k?)").expect("valid regex")
});
static REG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Reg\s*@\s*₹?([\d,]+(?:\.\d+)?)(k?)").expect("valid regex")
});
static PRICE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Price:\s*₹?([\d,]+(?:\.\d+)?)(k?)").expect("valid regex")
});
static MRP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)MRP\s*:?\s*₹?([\d,]+(?:\.\d+)?)(k?)").expect("valid regex")
});
static PERCENT_OFF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)%\s*(?:off|discount|save|savings)").expect("valid regex")
});
static SAVE_AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)save\s*₹?([\d,]+)").expect("valid regex"));
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:use\s+code|code\s*:)").expect("valid regex"));

/// Promo copy markers, word-bounded so "Office" and "Coffee" do not trip
/// the "off" check.
static PROMO_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:off|discount|save|limited)\b|flash\s*sale)").expect("valid regex")
});

/// Decorations channels sprinkle over titles.
const DECOR: &[char] = &[
    '✨', '🎯', '🔥', '⚡', '🎉', '💥', '🚀', '💰', '❌', '✅', '🛒', '🏷', '👉', '\u{fe0f}',
];

/// Words that mark a line as a product name rather than promo copy.
const PRODUCT_KEYWORDS: &[&str] = &[
    "headphones", "mouse", "watch", "laptop", "phone", "smartphone", "tablet", "camera",
    "speaker", "earbuds", "charger", "cable", "adapter", "keyboard", "monitor", "tv",
    "television", "gaming", "wireless", "bluetooth", "smart", "premium", "pro", "max", "mini",
    "ultra", "edition", "series", "model",
];

const MAX_DESCRIPTION_LINES: usize = 3;
const MAX_DESCRIPTION_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct MessageItem {
    /// Title paired with this URL from the surrounding lines, if any.
    pub title: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedMessage {
    /// One entry per distinct URL, in posting order.
    pub items: Vec<MessageItem>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub original_price: Option<String>,
    pub currency: Option<String>,
    pub discount_percent: Option<i32>,
    /// Promo-code line ("Use code SAVE10"), carried into descriptions.
    pub discount_line: Option<String>,
}

pub fn parse(msg: &RawMessage) -> ParsedMessage {
    let text = msg.text.as_str();
    let items = collect_items(text, msg);
    let (price, original_price, discount_percent) = parse_prices(text);

    ParsedMessage {
        title: fallback_title(text),
        description: description(text),
        currency: detect_currency(text),
        discount_line: discount_line(text),
        items,
        price,
        original_price,
        discount_percent,
    }
}

// --- URLs and pairing ---

fn collect_items(text: &str, msg: &RawMessage) -> Vec<MessageItem> {
    // (byte position, url) from every source, then dedupe in order.
    let mut found: Vec<(usize, String)> = Vec::new();

    for entity in &msg.entities {
        let Some(start) = byte_of_utf16(text, entity.offset) else {
            continue;
        };
        match entity.kind.as_str() {
            "url" => {
                if let Some(end) = byte_of_utf16(text, entity.offset + entity.length) {
                    found.push((start, text[start..end].to_string()));
                }
            }
            "text_link" => {
                if let Some(url) = &entity.url {
                    found.push((start, url.clone()));
                }
            }
            _ => {}
        }
    }
    for m in GENERAL_URL_RE.find_iter(text) {
        found.push((m.start(), m.as_str().to_string()));
    }
    for m in BARE_SHORTENER_RE.find_iter(text) {
        found.push((m.start(), m.as_str().to_string()));
    }

    found.sort_by_key(|(pos, _)| *pos);

    let lines = line_spans(text);
    let mut seen = HashSet::new();
    let mut used_title_lines = HashSet::new();
    let mut items = Vec::new();

    for (pos, raw) in found {
        let url = clean_url(&raw);
        if !seen.insert(url.clone()) {
            continue;
        }
        let line_idx = lines.iter().position(|(s, e)| pos >= *s && pos < *e);
        let title = line_idx.and_then(|idx| {
            pair_title(text, &lines, idx, pos, &mut used_title_lines)
        });
        items.push(MessageItem { title, url });
    }
    items
}

fn clean_url(raw: &str) -> String {
    let trimmed = raw.trim_end_matches(['.', ',', ';', '!', '?', ')', ']']);
    resolver::ensure_scheme(trimmed)
}

/// Prefer text on the same line before the URL; otherwise walk upward to
/// the nearest unclaimed line that reads like a product name.
fn pair_title(
    text: &str,
    lines: &[(usize, usize)],
    line_idx: usize,
    url_pos: usize,
    used: &mut HashSet<usize>,
) -> Option<String> {
    let (line_start, _) = lines[line_idx];
    let inline = strip_decor(&text[line_start..url_pos]);
    if is_title_candidate(&inline) {
        return Some(inline);
    }

    for idx in (0..line_idx).rev() {
        if used.contains(&idx) {
            continue;
        }
        let (s, e) = lines[idx];
        let line = &text[s..e];
        if line_has_url(line) {
            break;
        }
        let cleaned = strip_decor(line);
        if is_title_candidate(&cleaned) {
            used.insert(idx);
            return Some(cleaned);
        }
    }
    None
}

fn line_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == '\n' {
            spans.push((start, i));
            start = i + 1;
        }
    }
    spans.push((start, text.len()));
    spans
}

fn line_has_url(line: &str) -> bool {
    GENERAL_URL_RE.is_match(line) || BARE_SHORTENER_RE.is_match(line)
}

/// Byte index of a UTF-16 code-unit offset. Telegram entity offsets count
/// UTF-16 units, not bytes or chars.
fn byte_of_utf16(text: &str, target: usize) -> Option<usize> {
    let mut units = 0;
    for (i, c) in text.char_indices() {
        if units == target {
            return Some(i);
        }
        units += c.len_utf16();
    }
    (units == target).then_some(text.len())
}

// --- titles ---

fn strip_decor(line: &str) -> String {
    line.replace(DECOR, "").trim().to_string()
}

fn is_title_candidate(line: &str) -> bool {
    if line.len() < 8 || line.len() >= 100 || line.starts_with("http") {
        return false;
    }
    !(line.contains("Deal @")
        || line.contains("Reg @")
        || line.contains("Price:")
        || line.contains("MRP")
        || line.contains('₹')
        || line.contains('%')
        || PROMO_WORD_RE.is_match(line)
        || CODE_RE.is_match(line)
        || !line.chars().any(|c| c.is_ascii_alphabetic()))
}

/// Message-level title: the first line naming a recognizable product kind,
/// otherwise the longest line that reads like a product name, otherwise
/// the first non-empty, non-URL line even when it is promo copy.
fn fallback_title(text: &str) -> Option<String> {
    let candidates: Vec<String> = text
        .lines()
        .map(strip_decor)
        .filter(|l| is_title_candidate(l))
        .collect();
    candidates
        .iter()
        .find(|l| {
            let lower = l.to_lowercase();
            PRODUCT_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .cloned()
        .or_else(|| candidates.into_iter().max_by_key(String::len))
        .or_else(|| {
            text.lines()
                .map(strip_decor)
                .find(|l| !l.is_empty() && !line_has_url(l))
        })
}

// --- prices ---

fn parse_prices(text: &str) -> (Option<String>, Option<String>, Option<i32>) {
    let mut price: Option<f64> = None;
    let mut original: Option<f64> = None;

    if let Some(caps) = RUPEE_PAIR_RE.captures(text) {
        price = prices::price_value(&caps[1]);
        original = prices::price_value(&caps[2]);
    }

    if price.is_none() {
        let amounts: Vec<f64> = RUPEE_RE
            .captures_iter(text)
            .filter_map(|c| amount(&c[1], &c[2]))
            .collect();
        price = amounts.first().copied();
        original = amounts.get(1).copied();
    }

    if price.is_none() {
        price = DEAL_RE.captures(text).and_then(|c| amount(&c[1], &c[2]));
    }
    if let Some(reg) = REG_RE.captures(text).and_then(|c| amount(&c[1], &c[2])) {
        if original.is_none() {
            original = Some(reg);
        } else if price.is_none() {
            price = Some(reg);
        }
    }
    if price.is_none() {
        price = PRICE_LABEL_RE.captures(text).and_then(|c| amount(&c[1], &c[2]));
    }
    if original.is_none() {
        original = MRP_RE.captures(text).and_then(|c| amount(&c[1], &c[2]));
    }

    // Channels sometimes post "₹999 ₹299" with the MRP first; keep the
    // pair ordered before anything derives from it.
    if let (Some(p), Some(o)) = (price, original) {
        if o < p {
            price = Some(o);
            original = Some(p);
        } else if o == p {
            original = None;
        }
    }

    let mut discount = PERCENT_OFF_RE
        .captures(text)
        .and_then(|c| c[1].parse::<i32>().ok());
    if discount.is_none() {
        if let (Some(saved), Some(o)) = (
            SAVE_AMOUNT_RE.captures(text).and_then(|c| prices::price_value(&c[1])),
            original,
        ) {
            if price.is_some() && o > 0.0 {
                discount = Some(((saved / o) * 100.0).round() as i32);
            }
        }
    }
    if discount.is_none() {
        if let (Some(p), Some(o)) = (price, original) {
            if o > p && o > 0.0 {
                let d = (((o - p) / o) * 100.0).round() as i32;
                if d > 0 && d <= 100 {
                    discount = Some(d);
                }
            }
        }
    }

    (
        price.map(prices::format_display),
        original.map(prices::format_display),
        discount,
    )
}

fn amount(digits: &str, suffix: &str) -> Option<f64> {
    let v = prices::price_value(digits)?;
    Some(if suffix.eq_ignore_ascii_case("k") {
        v * 1000.0
    } else {
        v
    })
}

fn detect_currency(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    if text.contains('₹') || lower.contains("rs.") || lower.contains(" inr") {
        Some("INR".to_string())
    } else if text.contains('$') {
        Some("USD".to_string())
    } else if text.contains('€') {
        Some("EUR".to_string())
    } else if text.contains('£') {
        Some("GBP".to_string())
    } else if text.contains('¥') {
        Some("JPY".to_string())
    } else {
        None
    }
}

// --- description and promo lines ---

fn discount_line(text: &str) -> Option<String> {
    text.lines()
        .map(strip_decor)
        .find(|l| CODE_RE.is_match(l))
        .filter(|l| !l.is_empty())
}

fn description(text: &str) -> Option<String> {
    let title = fallback_title(text);
    let picked: Vec<String> = text
        .lines()
        .map(strip_decor)
        .filter(|l| {
            !l.is_empty()
                && !line_has_url(l)
                && !l.contains("Deal @")
                && !l.contains("Reg @")
                && !l.contains("Price:")
                && !l.contains("MRP")
                && !PERCENT_OFF_RE.is_match(l)
                && Some(l) != title.as_ref()
        })
        .take(MAX_DESCRIPTION_LINES)
        .collect();
    if picked.is_empty() {
        return None;
    }
    let joined = picked.join(" ");
    let truncated: String = joined.chars().take(MAX_DESCRIPTION_CHARS).collect();
    let trimmed = truncated.trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dealfeed_common::EntitySpan;

    fn msg(text: &str) -> RawMessage {
        RawMessage {
            channel_id: -1001,
            channel_title: Some("Test Channel".to_string()),
            message_id: 1,
            text: text.to_string(),
            entities: Vec::new(),
            photo_url: None,
            timestamp: Utc::now(),
        }
    }

    // --- URL collection ---

    #[test]
    fn collects_plain_and_bare_shortener_urls() {
        let parsed = parse(&msg(
            "Deal of the day\nhttps://www.amazon.in/dp/B0X?tag=old\nAlso amzn.to/3xYz!",
        ));
        let urls: Vec<&str> = parsed.items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://www.amazon.in/dp/B0X?tag=old", "https://amzn.to/3xYz"]
        );
    }

    #[test]
    fn text_link_entities_contribute_hidden_urls() {
        let mut m = msg("🔥 Crazy deal here");
        m.entities.push(EntitySpan {
            kind: "text_link".to_string(),
            offset: 3,
            length: 10,
            url: Some("https://fkrt.cc/abc".to_string()),
        });
        let parsed = parse(&m);
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].url, "https://fkrt.cc/abc");
    }

    #[test]
    fn url_entity_offsets_are_utf16() {
        // The emoji is 2 UTF-16 units, so the entity offset is shifted.
        let text = "🔥 https://bitli.in/xyz";
        let mut m = msg(text);
        m.entities.push(EntitySpan {
            kind: "url".to_string(),
            offset: 3,
            length: 20,
            url: None,
        });
        let parsed = parse(&m);
        assert_eq!(parsed.items[0].url, "https://bitli.in/xyz");
    }

    #[test]
    fn duplicate_urls_collapse() {
        let parsed = parse(&msg(
            "https://shop.example/p/1\nagain https://shop.example/p/1",
        ));
        assert_eq!(parsed.items.len(), 1);
    }

    // --- pairing ---

    #[test]
    fn each_url_pairs_with_its_own_title_line() {
        let parsed = parse(&msg(
            "✨ Sony WH-1000XM5 Headphones\nhttps://amzn.to/aaa\n\n✨ Logitech MX Master 3S\nhttps://amzn.to/bbb",
        ));
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(
            parsed.items[0].title.as_deref(),
            Some("Sony WH-1000XM5 Headphones")
        );
        assert_eq!(
            parsed.items[1].title.as_deref(),
            Some("Logitech MX Master 3S")
        );
    }

    #[test]
    fn price_lines_are_not_titles() {
        let parsed = parse(&msg("₹1,499 only!\nhttps://amzn.to/aaa"));
        assert_eq!(parsed.items[0].title, None);
    }

    // --- prices ---

    #[test]
    fn rupee_pair_splits_into_price_and_original() {
        let parsed = parse(&msg("Boat Airdopes ₹1,099 ₹2,990\nhttps://amzn.to/x"));
        assert_eq!(parsed.price.as_deref(), Some("1,099"));
        assert_eq!(parsed.original_price.as_deref(), Some("2,990"));
        assert_eq!(parsed.discount_percent, Some(63));
        assert_eq!(parsed.currency.as_deref(), Some("INR"));
    }

    #[test]
    fn reversed_rupee_pair_is_reordered() {
        let parsed = parse(&msg("Crazy drop ₹999 ₹299\nhttps://amzn.to/x"));
        assert_eq!(parsed.price.as_deref(), Some("299"));
        assert_eq!(parsed.original_price.as_deref(), Some("999"));
        assert_eq!(parsed.discount_percent, Some(70));
    }

    #[test]
    fn deal_and_reg_labels_with_k_suffix() {
        let parsed = parse(&msg("Deal @ 1.5k\nReg @ 3k\nhttps://fkrt.cc/x"));
        assert_eq!(parsed.price.as_deref(), Some("1,500"));
        assert_eq!(parsed.original_price.as_deref(), Some("3,000"));
        assert_eq!(parsed.discount_percent, Some(50));
    }

    #[test]
    fn explicit_percent_off_wins() {
        let parsed = parse(&msg("Flat 70% off\nPrice: ₹899\nhttps://amzn.to/x"));
        assert_eq!(parsed.price.as_deref(), Some("899"));
        assert_eq!(parsed.discount_percent, Some(70));
    }

    #[test]
    fn mrp_fills_original() {
        let parsed = parse(&msg("Price: ₹499 MRP: ₹999\nhttps://amzn.to/x"));
        assert_eq!(parsed.price.as_deref(), Some("499"));
        assert_eq!(parsed.original_price.as_deref(), Some("999"));
    }

    // --- extras ---

    #[test]
    fn promo_code_line_is_captured() {
        let parsed = parse(&msg(
            "Nice Kettle Deal Today\nUse code KETTLE10 at checkout\nhttps://shop.example/p/1",
        ));
        assert_eq!(
            parsed.discount_line.as_deref(),
            Some("Use code KETTLE10 at checkout")
        );
    }

    #[test]
    fn description_skips_urls_titles_and_price_lines() {
        let parsed = parse(&msg(
            "Sony WH-1000XM5 Headphones\nIndustry leading noise cancellation\nPrice: ₹24,990\nhttps://amzn.to/x",
        ));
        assert_eq!(
            parsed.description.as_deref(),
            Some("Industry leading noise cancellation")
        );
    }

    #[test]
    fn promo_only_message_falls_back_to_first_line() {
        let parsed = parse(&msg(
            "Flat 50% off everything!\nLimited period deal\nhttps://shop.example/sale",
        ));
        assert_eq!(parsed.title.as_deref(), Some("Flat 50% off everything!"));
    }

    #[test]
    fn off_inside_words_does_not_disqualify_titles() {
        let parsed = parse(&msg("Office Coffee Maker Deluxe\nhttps://amzn.to/x"));
        assert_eq!(
            parsed.items[0].title.as_deref(),
            Some("Office Coffee Maker Deluxe")
        );
        assert_eq!(parsed.title.as_deref(), Some("Office Coffee Maker Deluxe"));
    }

    #[test]
    fn message_without_urls_still_parses() {
        let parsed = parse(&msg("Weekend sale starts tomorrow, stay tuned"));
        assert!(parsed.items.is_empty());
        assert_eq!(parsed.price, None);
    }
}
