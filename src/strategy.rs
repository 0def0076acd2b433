//! Cache strategy classification from upstream path shape

use crate::config::MirrorConfig;

/// Label identifying which caching rule matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyLabel {
    /// Frequently-updated content (branch heads, nightlies): short TTLs,
    /// validator-refreshed
    Dynamic,
    /// Immutable-by-convention content (tagged releases): long TTLs, no
    /// validator needed
    Versioned,
    /// Everything else: medium TTLs, validator-refreshed
    Default,
}

impl PolicyLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyLabel::Dynamic => "dynamic",
            PolicyLabel::Versioned => "versioned",
            PolicyLabel::Default => "default",
        }
    }
}

/// Caching policy for a resolved upstream path
///
/// A pure function of the path; recomputed per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Seconds a response may be served from the shared cache tier
    pub edge_ttl: u64,
    /// Seconds a client-side cache may serve the response
    pub browser_ttl: u64,
    /// Whether the cache key should be re-derived from the upstream validator
    pub use_validator: bool,
    pub label: PolicyLabel,
}

/// Path segments that mark frequently-changing content
const VOLATILE_MARKERS: [&str; 4] = ["/latest/", "/nightly/", "/master/", "/main/"];

/// Classify an upstream path into a caching policy
///
/// Rules are evaluated in priority order, first match wins:
/// 1. volatile marker segment -> dynamic
/// 2. version-tag shape (`/v1.2/`, `/v1.2.3/`, `/tag/`, `/tags/`,
///    `/releases/download/v<digits>`) -> versioned
/// 3. otherwise -> default
///
/// Volatility beats version shape: a path that looks versioned but also
/// contains a volatile marker is classified dynamic, because such content can
/// still move under the client.
pub fn classify(path: &str, config: &MirrorConfig) -> CachePolicy {
    if VOLATILE_MARKERS.iter().any(|m| path.contains(m)) {
        return CachePolicy {
            edge_ttl: config.dynamic_edge_ttl,
            browser_ttl: config.dynamic_browser_ttl,
            use_validator: true,
            label: PolicyLabel::Dynamic,
        };
    }

    if is_versioned_path(path) {
        return CachePolicy {
            edge_ttl: config.versioned_edge_ttl,
            browser_ttl: config.versioned_browser_ttl,
            use_validator: false,
            label: PolicyLabel::Versioned,
        };
    }

    CachePolicy {
        edge_ttl: config.default_edge_ttl,
        browser_ttl: config.default_browser_ttl,
        use_validator: true,
        label: PolicyLabel::Default,
    }
}

/// Check whether a path contains a version-tag shape
fn is_versioned_path(path: &str) -> bool {
    let parts: Vec<&str> = path.split('/').collect();

    // Version-number and tag segments must be followed by another segment
    // (i.e. an interior `/x/`), so skip the final part here.
    for part in parts.iter().take(parts.len().saturating_sub(1)) {
        if *part == "tag" || *part == "tags" || is_version_segment(part) {
            return true;
        }
    }

    // Release-asset downloads match on the tag prefix alone, trailing slash
    // or not.
    for window in parts.windows(3) {
        if window[0] == "releases" && window[1] == "download" && is_release_tag(window[2]) {
            return true;
        }
    }

    false
}

/// Whole-segment match for `v?<major>.<minor>[.<patch>]`
fn is_version_segment(segment: &str) -> bool {
    let digits = segment.strip_prefix('v').unwrap_or(segment);
    let fields: Vec<&str> = digits.split('.').collect();

    (fields.len() == 2 || fields.len() == 3)
        && fields
            .iter()
            .all(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
}

/// Prefix match for a release tag: optional `v`, then at least one digit
fn is_release_tag(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .unwrap_or(segment)
        .bytes()
        .next()
        .is_some_and(|b| b.is_ascii_digit())
}
