use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::fetch::PageFetcher;

/// Redirect hops followed before giving up on a chain.
pub const MAX_HOPS: usize = 5;

/// Hosts that only ever serve redirects. Used to decide whether a URL is
/// worth resolving before scraping.
const SHORTENER_HOSTS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "goo.gl",
    "t.co",
    "amzn.to",
    "a.co",
    "fkrt.it",
    "cutt.ly",
    "spoo.me",
    "da.gd",
    "bitli.in",
    "extp.in",
    "short.link",
    "dl.flipkart.com",
    "linksredirect.com",
];

static AMAZON_ASIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(?:dp|gp/product)/([A-Z0-9]{10})(?:[/?#]|$)").expect("valid regex")
});
static FLIPKART_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]pid=([A-Z0-9]+)|/p/(itm[0-9a-zA-Z]+)").expect("valid regex"));

/// Outcome of chasing a URL through its redirect chain. `status` 0 means
/// the network never answered; everything else is the final HTTP status.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub final_url: String,
    pub visited: Vec<String>,
    pub status: u16,
    pub body: String,
}

impl Resolution {
    /// Hostname of the final URL, without a `www.` prefix.
    pub fn hostname(&self) -> String {
        Url::parse(&self.final_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .map(|h| h.trim_start_matches("www.").to_string())
            .unwrap_or_default()
    }
}

/// Messages routinely carry scheme-less links ("amzn.to/xyz").
pub fn ensure_scheme(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

pub fn is_shortened(url: &str) -> bool {
    let with_scheme = ensure_scheme(url);
    let Ok(parsed) = Url::parse(&with_scheme) else {
        return false;
    };
    match parsed.host_str() {
        Some(host) => {
            let host = host.trim_start_matches("www.");
            SHORTENER_HOSTS.iter().any(|s| host == *s)
        }
        None => false,
    }
}

/// Marketplace product id embedded in a URL path (Amazon ASIN, Flipkart
/// item id). Lets the extractor confirm it landed on a product page.
pub fn marketplace_product_id(url: &str) -> Option<String> {
    if let Some(caps) = AMAZON_ASIN_RE.captures(url) {
        return Some(caps[1].to_string());
    }
    if let Some(caps) = FLIPKART_ITEM_RE.captures(url) {
        return caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string());
    }
    None
}

/// Follow the redirect chain by hand, up to `MAX_HOPS` hops. Never fails:
/// a network error yields status 0 and the last URL attempted, a hop-capped
/// chain yields the last response seen.
pub async fn resolve(fetcher: &dyn PageFetcher, raw_url: &str) -> Resolution {
    resolve_with_hops(fetcher, raw_url, MAX_HOPS).await
}

pub async fn resolve_with_hops(
    fetcher: &dyn PageFetcher,
    raw_url: &str,
    max_hops: usize,
) -> Resolution {
    let mut current = ensure_scheme(raw_url);
    let mut visited = vec![current.clone()];

    let mut hops = 0;
    loop {
        let resp = match fetcher.fetch(&current).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url = %current, error = %e, "resolve failed");
                return Resolution {
                    final_url: current,
                    visited,
                    status: 0,
                    body: String::new(),
                };
            }
        };

        let redirect = (300..400).contains(&resp.status);
        if redirect && hops < max_hops {
            if let Some(next) = resp.location.as_deref().and_then(|loc| join_location(&current, loc)) {
                if visited.contains(&next) {
                    debug!(url = %next, "redirect loop detected");
                    return Resolution {
                        final_url: current,
                        visited,
                        status: resp.status,
                        body: resp.body,
                    };
                }
                visited.push(next.clone());
                current = next;
                hops += 1;
                continue;
            }
        }

        return Resolution {
            final_url: current,
            visited,
            status: resp.status,
            body: resp.body,
        };
    }
}

/// Location headers may be relative; join them against the current URL.
fn join_location(current: &str, location: &str) -> Option<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Some(location.to_string());
    }
    let base = Url::parse(current).ok()?;
    base.join(location).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedFetcher;

    // --- scheme and shortener handling ---

    #[test]
    fn ensure_scheme_prepends_https() {
        assert_eq!(ensure_scheme("amzn.to/xyz"), "https://amzn.to/xyz");
        assert_eq!(ensure_scheme("https://a.in/p"), "https://a.in/p");
        assert_eq!(ensure_scheme("http://a.in/p"), "http://a.in/p");
    }

    #[test]
    fn detects_shortened_hosts() {
        assert!(is_shortened("https://bit.ly/3xYz"));
        assert!(is_shortened("amzn.to/d/abc"));
        assert!(!is_shortened("https://www.amazon.in/dp/B0ABCDEFGH"));
    }

    #[test]
    fn extracts_amazon_asin() {
        assert_eq!(
            marketplace_product_id("https://www.amazon.in/some-product/dp/B0ABCDEFGH?th=1"),
            Some("B0ABCDEFGH".to_string())
        );
        assert_eq!(
            marketplace_product_id("https://www.amazon.in/gp/product/B09XYZ12345"),
            None, // 11 chars, not an ASIN
        );
    }

    #[test]
    fn extracts_flipkart_item_id() {
        assert_eq!(
            marketplace_product_id("https://www.flipkart.com/phone/p/itmabc123?pid=MOBG7H"),
            Some("itmabc123".to_string())
        );
    }

    // --- resolution ---

    #[tokio::test]
    async fn follows_redirect_chain() {
        let fetcher = ScriptedFetcher::new()
            .redirect("https://bit.ly/x", "https://amzn.to/y")
            .redirect("https://amzn.to/y", "https://www.amazon.in/dp/B0ABCDEFGH")
            .page("https://www.amazon.in/dp/B0ABCDEFGH", 200, "<html>product</html>");

        let res = resolve(&fetcher, "bit.ly/x").await;
        assert_eq!(res.status, 200);
        assert_eq!(res.final_url, "https://www.amazon.in/dp/B0ABCDEFGH");
        assert_eq!(res.visited.len(), 3);
        assert_eq!(res.body, "<html>product</html>");
    }

    #[tokio::test]
    async fn relative_location_joins_against_current() {
        let fetcher = ScriptedFetcher::new()
            .redirect("https://shop.example/p/1", "/products/widget")
            .page("https://shop.example/products/widget", 200, "ok");

        let res = resolve(&fetcher, "https://shop.example/p/1").await;
        assert_eq!(res.final_url, "https://shop.example/products/widget");
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn network_failure_yields_status_zero() {
        let fetcher = ScriptedFetcher::new(); // knows no URLs
        let res = resolve(&fetcher, "https://unreachable.example/x").await;
        assert_eq!(res.status, 0);
        assert_eq!(res.final_url, "https://unreachable.example/x");
        assert!(res.body.is_empty());
        assert_eq!(res.visited, vec!["https://unreachable.example/x"]);
    }

    #[tokio::test]
    async fn hop_cap_returns_last_response() {
        let mut fetcher = ScriptedFetcher::new();
        for i in 0..10 {
            fetcher = fetcher.redirect(
                &format!("https://hop.example/{i}"),
                &format!("https://hop.example/{}", i + 1),
            );
        }

        let res = resolve(&fetcher, "https://hop.example/0").await;
        // Initial URL + MAX_HOPS redirects followed.
        assert_eq!(res.visited.len(), MAX_HOPS + 1);
        assert_eq!(res.final_url, format!("https://hop.example/{MAX_HOPS}"));
        assert_eq!(res.status, 302);
    }

    #[tokio::test]
    async fn redirect_loop_stops() {
        let fetcher = ScriptedFetcher::new()
            .redirect("https://a.example/", "https://b.example/")
            .redirect("https://b.example/", "https://a.example/");

        let res = resolve(&fetcher, "https://a.example/").await;
        assert_eq!(res.final_url, "https://b.example/");
        assert_eq!(res.visited.len(), 2);
    }

    #[test]
    fn hostname_strips_www() {
        let res = Resolution {
            final_url: "https://www.amazon.in/dp/B0ABCDEFGH".into(),
            visited: vec![],
            status: 200,
            body: String::new(),
        };
        assert_eq!(res.hostname(), "amazon.in");
    }
}
