use url::form_urlencoded;
use url::Url;

use dealfeed_common::AffiliateStrategy;

/// Query parameters that mark someone else's affiliate attribution.
/// Stripped before our own rewriting.
const FOREIGN_PARAMS: &[&str] = &["tag", "ref", "affiliate", "partner", "cid", "source"];

/// Redirector hosts whose `url` parameter carries the real destination.
const WRAPPER_HOSTS: &[&str] = &["linksredirect.com", "inrdeals.com", "earnkaro.com"];

/// How many nested wrapper layers to unwrap before giving up.
const MAX_UNWRAP_DEPTH: usize = 3;

/// Rewrite a product URL for a channel. Total: every strategy yields a
/// string, and an unparsable URL degrades to naive concatenation.
pub fn convert(url: &str, strategy: &AffiliateStrategy) -> String {
    match strategy {
        AffiliateStrategy::Passthrough => url.to_string(),

        AffiliateStrategy::TagInjection { params } => {
            let cleaned = clean_url(url);
            match Url::parse(&cleaned) {
                Ok(parsed) => set_query_params(parsed, params),
                Err(_) => {
                    let base = cleaned.split('?').next().unwrap_or(&cleaned).to_string();
                    let joined = params
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect::<Vec<_>>()
                        .join("&");
                    format!("{base}?{joined}")
                }
            }
        }

        AffiliateStrategy::RedirectWrapper {
            endpoint,
            url_param,
            extra,
        } => {
            let cleaned = clean_url(url);
            match Url::parse(endpoint) {
                Ok(mut ep) => {
                    {
                        let mut qp = ep.query_pairs_mut();
                        for (k, v) in extra {
                            qp.append_pair(k, v);
                        }
                        qp.append_pair(url_param, &cleaned);
                    }
                    ep.to_string()
                }
                Err(_) => {
                    let encoded: String =
                        form_urlencoded::byte_serialize(cleaned.as_bytes()).collect();
                    format!("{endpoint}?{url_param}={encoded}")
                }
            }
        }

        AffiliateStrategy::SuffixToken { token } => {
            let cleaned = clean_url(url);
            let sep = if cleaned.contains('?') { '&' } else { '?' };
            format!("{cleaned}{sep}{token}")
        }

        AffiliateStrategy::MultiPlatform { candidates } => match candidates.first() {
            Some(primary) => convert(url, primary),
            None => url.to_string(),
        },
    }
}

/// Strip foreign affiliate attribution: unwrap known redirectors, then
/// drop their tracking parameters. Unparsable input is returned unchanged.
pub fn clean_url(raw: &str) -> String {
    let mut current = raw.to_string();
    for _ in 0..MAX_UNWRAP_DEPTH {
        match unwrap_wrapper(&current) {
            Some(inner) => current = inner,
            None => break,
        }
    }
    strip_foreign_params(&current)
}

fn unwrap_wrapper(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.");
    let wrapped = WRAPPER_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")));
    if !wrapped {
        return None;
    }
    parsed
        .query_pairs()
        .find(|(k, _)| k == "url")
        .map(|(_, v)| v.into_owned())
}

fn strip_foreign_params(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let retained: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_foreign_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    parsed.set_query(None);
    if !retained.is_empty() {
        let mut qp = parsed.query_pairs_mut();
        for (k, v) in &retained {
            qp.append_pair(k, v);
        }
    }
    parsed.to_string()
}

fn is_foreign_param(name: &str) -> bool {
    FOREIGN_PARAMS.iter().any(|p| name == *p) || name.starts_with("utm_")
}

/// Set (not append) query parameters on a URL.
fn set_query_params(mut parsed: Url, params: &[(String, String)]) -> String {
    let retained: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !params.iter().any(|(pk, _)| pk == k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    parsed.set_query(None);
    {
        let mut qp = parsed.query_pairs_mut();
        for (k, v) in &retained {
            qp.append_pair(k, v);
        }
        for (k, v) in params {
            qp.append_pair(k, v);
        }
    }
    parsed.to_string()
}
