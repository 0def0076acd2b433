//! Versioned cache-key construction
//!
//! Cache keys are the original request URL annotated with two reserved query
//! parameters: `__v` (a version tag, either a normalized upstream validator
//! or the current UTC date) and `__enc` (the negotiated content encoding).
//! Any client-supplied `__v`/`__enc` parameters are discarded so callers
//! cannot forge key collisions.

use chrono::{DateTime, Utc};
use url::Url;

/// Reserved query parameters owned by the key builder
const RESERVED_PARAMS: [&str; 2] = ["__v", "__enc"];

/// Maximum length of a normalized validator tag
const VALIDATOR_MAX_LEN: usize = 32;

/// Daily version tag derived from the current UTC date (`YYYYMMDD`)
///
/// Keys built without an upstream validator roll over at UTC midnight, which
/// bounds the staleness of date-keyed entries to one day.
pub fn date_version(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d").to_string()
}

/// Pick the encoding tag for a key from the request's Accept-Encoding
///
/// Brotli is preferred over gzip; anything else keys as unencoded.
pub fn encoding_tag(accept_encoding: &str) -> Option<&'static str> {
    if accept_encoding.contains("br") {
        Some("br")
    } else if accept_encoding.contains("gzip") {
        Some("gzip")
    } else {
        None
    }
}

/// Normalize an upstream entity validator into a key-safe version tag
///
/// Strips the weak prefix and surrounding quotes, then truncates to 32
/// characters. Returns `None` if nothing remains.
pub fn normalize_validator(etag: &str) -> Option<String> {
    let cleaned = etag.trim();
    let cleaned = cleaned.strip_prefix("W/").unwrap_or(cleaned);
    let cleaned = cleaned.trim_matches('"');

    if cleaned.is_empty() {
        return None;
    }

    Some(cleaned.chars().take(VALIDATOR_MAX_LEN).collect())
}

/// Build a cache key for a request
///
/// # Arguments
/// * `original_url` - The inbound request URL (host, path, and query)
/// * `accept_encoding` - The request's Accept-Encoding header value
/// * `version` - Explicit version tag; today's UTC date when `None`
///
/// Non-reserved query parameters are preserved in their original order, so
/// requests that differ only in reserved parameters share a key.
pub fn build_key(original_url: &Url, accept_encoding: &str, version: Option<&str>) -> String {
    let version = match version {
        Some(v) => v.to_string(),
        None => date_version(Utc::now()),
    };

    let retained: Vec<(String, String)> = original_url
        .query_pairs()
        .filter(|(k, _)| !RESERVED_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut key_url = original_url.clone();
    key_url.set_query(None);
    {
        let mut pairs = key_url.query_pairs_mut();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("__v", &version);
        if let Some(enc) = encoding_tag(accept_encoding) {
            pairs.append_pair("__enc", enc);
        }
    }

    key_url.to_string()
}
