use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Long uppercase alphanumeric runs are product ids, not words.
static ID_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z0-9]{8,}").expect("valid regex"));

/// Derive a human-readable title from a URL path. Marketplace URLs embed
/// the product name as a hyphenated slug ("/apple-iphone-15-pro/dp/...").
/// Returns None when nothing readable survives.
pub fn title_from_path(final_url: &str) -> Option<String> {
    let parsed = Url::parse(final_url).ok()?;
    let parts: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();

    let candidate = parts
        .iter()
        .find(|p| p.contains('-') && !p.eq_ignore_ascii_case("dp"))
        .copied()
        .or_else(|| parts.last().copied())?;

    let stripped = ID_RUN_RE.replace_all(candidate, "");
    let cleaned = stripped
        .split(['-', '_', '+'])
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let cleaned = cleaned.trim().to_string();

    if cleaned.len() > 5 {
        Some(cleaned)
    } else {
        None
    }
}
