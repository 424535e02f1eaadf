use url::Url;

/// Assets that are never product shots.
const REJECT_SUBSTRINGS: &[&str] = &[
    ".svg",
    "sprite",
    "icon",
    "logo",
    "placeholder",
    "via.placeholder",
    "spacer",
    "1x1",
];

/// Vet an image candidate: reject chrome assets, resolve relative paths
/// against the page URL, and prefer https.
pub(crate) fn sanitize(candidate: &str, base_url: &str) -> Option<String> {
    let c = candidate.trim();
    if c.is_empty() || c.starts_with("data:") {
        return None;
    }
    let lower = c.to_lowercase();
    if REJECT_SUBSTRINGS.iter().any(|b| lower.contains(b)) {
        return None;
    }

    let absolute = if c.starts_with("//") {
        format!("https:{c}")
    } else if c.starts_with("http://") || c.starts_with("https://") {
        c.to_string()
    } else {
        Url::parse(base_url).ok()?.join(c).ok()?.to_string()
    };

    if let Some(rest) = absolute.strip_prefix("http://") {
        Some(format!("https://{rest}"))
    } else {
        Some(absolute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://shop.example/products/widget";

    #[test]
    fn rejects_chrome_assets() {
        assert_eq!(sanitize("/assets/logo.png", BASE), None);
        assert_eq!(sanitize("https://cdn.example/sprite-sheet.png", BASE), None);
        assert_eq!(sanitize("https://cdn.example/img.svg", BASE), None);
        assert_eq!(sanitize("https://via.placeholder.com/300", BASE), None);
        assert_eq!(sanitize("data:image/png;base64,AAAA", BASE), None);
    }

    #[test]
    fn resolves_relative_paths() {
        assert_eq!(
            sanitize("/cdn/shop/widget.jpg", BASE),
            Some("https://shop.example/cdn/shop/widget.jpg".to_string())
        );
        assert_eq!(
            sanitize("//cdn.example/widget.jpg", BASE),
            Some("https://cdn.example/widget.jpg".to_string())
        );
    }

    #[test]
    fn upgrades_http_to_https() {
        assert_eq!(
            sanitize("http://cdn.example/widget.jpg", BASE),
            Some("https://cdn.example/widget.jpg".to_string())
        );
    }
}
