//! Link normalisation for matching registered links against quest links.
//!
//! Canonicalises social links so that equivalent posts (differing only in
//! `www.`/`mobile.` prefixes, the `twitter.com` → `x.com` rename, tracking
//! parameters, fragments, or a trailing slash) compare as equal.

use url::Url;

/// Share/tracking query parameters that are stripped during normalisation.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "igshid",
    "igsh",
    "ref",
    "ref_src",
    "s",
    "t",
    "si",
    "feature",
    "is_from_webapp",
    "sender_device",
];

/// Host prefixes that do not change which post a link points to.
const HOST_PREFIXES: &[&str] = &["www.", "mobile.", "m."];

/// Hosts that are aliases of another host.
const HOST_ALIASES: &[(&str, &str)] = &[("twitter.com", "x.com"), ("youtu.be", "youtube.com")];

/// Normalise a link for registry lookups.
///
/// 1. Lowercase scheme and host, force `https`.
/// 2. Strip `www.`/`mobile.`/`m.` and map host aliases.
/// 3. Drop the fragment and tracking parameters; sort what remains.
/// 4. Remove a trailing slash from the path (unless the path is `/`).
///
/// Input that cannot be parsed as a URL is returned trimmed but otherwise
/// unchanged.
pub fn normalize_link(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_owned();
    };
    if !parsed.has_host() {
        return raw.to_owned();
    }

    parsed.set_fragment(None);
    if parsed.scheme() == "http" {
        let _ = parsed.set_scheme("https");
    }
    if matches!(parsed.port(), Some(80) | Some(443)) {
        let _ = parsed.set_port(None);
    }

    let mut host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    for prefix in HOST_PREFIXES {
        if let Some(stripped) = host.strip_prefix(prefix) {
            host = stripped.to_owned();
            break;
        }
    }
    let youtu_be = host == "youtu.be";
    if let Some((_, canonical)) = HOST_ALIASES.iter().find(|(alias, _)| *alias == host) {
        host = (*canonical).to_owned();
    }
    if parsed.set_host(Some(&host)).is_err() {
        return raw.to_owned();
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    // youtu.be/<id> is youtube.com/watch?v=<id>
    if youtu_be {
        let id = parsed.path().trim_matches('/').to_owned();
        if !id.is_empty() {
            params.push(("v".to_owned(), id));
            parsed.set_path("/watch");
        }
    }

    params.sort();
    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(params);
    }

    let path = parsed.path().to_owned();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    parsed.to_string()
}
