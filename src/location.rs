//! Canonical location keys and their public URLs.
//!
//! Events, clicks, the city registry and the index queue are all keyed by the
//! same normalized form so a city cannot be tracked under two spellings.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::config::IndexingConfig;

/// Normalizes a raw location identifier: trims, lowercases and collapses every
/// run of non-alphanumeric characters into a single `-`.
///
/// ```
/// use seo_pipeline::location::canonical_key;
///
/// assert_eq!(canonical_key("  New York City "), "new-york-city");
/// assert_eq!(canonical_key("rio_de__janeiro"), "rio-de-janeiro");
/// ```
pub fn canonical_key(raw: &str) -> String {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    let re = SEPARATORS
        .get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").expect("separator regex is valid"));

    let lowered = raw.trim().to_lowercase();
    re.replace_all(&lowered, "-").trim_matches('-').to_string()
}

/// Public URL of a location page, the conflict key of the index queue.
///
/// Path segments are percent-encoded, so non-ASCII keys map to one stable URL.
pub fn canonical_url(cfg: &IndexingConfig, location_key: &str) -> String {
    let key = canonical_key(location_key);
    let prefix: Vec<&str> = cfg
        .location_path_prefix
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    join_segments(&cfg.site_base_url, &prefix, &key).unwrap_or_else(|| {
        // Config validation rejects bases that cannot carry a path
        let base = cfg.site_base_url.trim_end_matches('/');
        std::iter::once(base)
            .chain(prefix.iter().copied())
            .chain(std::iter::once(key.as_str()))
            .collect::<Vec<_>>()
            .join("/")
    })
}

fn join_segments(base: &str, prefix: &[&str], key: &str) -> Option<String> {
    let mut url = Url::parse(base).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(prefix)
        .push(key);
    Some(url.into())
}
