//! Request orchestration: resolve, classify, cache, fetch, rewrite
//!
//! `MirrorProxy` owns the full life of a request after the HTTP surface has
//! parsed it. The flow is: resolve the path against the allow-list, answer
//! preflights, enforce the method set, probe the cache under a date-versioned
//! key, fetch upstream on a miss, re-key under the upstream validator, and
//! write back asynchronously so the client never waits on the store.

use crate::cache_key::{build_key, date_version, normalize_validator};
use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::fetcher::UpstreamFetcher;
use crate::metrics::MirrorMetrics;
use crate::store::{CachedResponse, ResponseStore};
use crate::strategy::{classify, CachePolicy};
use bytes::Bytes;
use chrono::Utc;
use http::header::{
    HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    ACCESS_CONTROL_MAX_AGE, CACHE_CONTROL, CONNECTION, CONTENT_LENGTH, ETAG, IF_MODIFIED_SINCE,
    IF_NONE_MATCH, RANGE, TRANSFER_ENCODING, USER_AGENT, VARY, X_CONTENT_TYPE_OPTIONS,
    X_FRAME_OPTIONS,
};
use http::{HeaderMap, Method, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

const X_CACHE_STATUS: HeaderName = HeaderName::from_static("x-cache-status");
const X_CACHE_POLICY: HeaderName = HeaderName::from_static("x-cache-policy");
const X_UPSTREAM_URL: HeaderName = HeaderName::from_static("x-upstream-url");
const X_RESPONSE_TIME: HeaderName = HeaderName::from_static("x-response-time");
const X_MIRROR_VERSION: HeaderName = HeaderName::from_static("x-mirror-version");
const IF_RANGE: HeaderName = HeaderName::from_static("if-range");

/// Request headers forwarded upstream; everything else is dropped
const FORWARDED_HEADERS: [HeaderName; 7] = [
    RANGE,
    IF_RANGE,
    IF_NONE_MATCH,
    IF_MODIFIED_SINCE,
    USER_AGENT,
    ACCEPT,
    ACCEPT_ENCODING,
];

/// A response ready for the HTTP surface to serialize
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Orchestrator for a single mirror deployment
pub struct MirrorProxy {
    config: Arc<MirrorConfig>,
    fetcher: UpstreamFetcher,
    store: Arc<dyn ResponseStore>,
    metrics: Arc<MirrorMetrics>,
}

impl MirrorProxy {
    pub fn new(
        config: Arc<MirrorConfig>,
        store: Arc<dyn ResponseStore>,
        metrics: Arc<MirrorMetrics>,
    ) -> Result<Self> {
        let fetcher = UpstreamFetcher::new(&config, Arc::clone(&metrics))?;
        Ok(MirrorProxy {
            config,
            fetcher,
            store,
            metrics,
        })
    }

    pub fn metrics(&self) -> &MirrorMetrics {
        &self.metrics
    }

    /// Handle one inbound request
    ///
    /// # Arguments
    /// * `method` - Inbound request method
    /// * `url` - Reconstructed inbound URL (path and query matter; the
    ///   authority only anchors cache keys)
    /// * `headers` - Inbound request headers
    pub async fn handle(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
    ) -> Result<ProxyResponse> {
        let started = Instant::now();
        self.metrics.record_request();

        // Resolution happens before the method check so even a preflight to
        // a bad path gets a 400.
        let target = crate::resolver::resolve(url.path(), &self.config).map_err(|e| {
            self.metrics.record_rejected();
            e
        })?;

        if method == Method::OPTIONS {
            self.metrics.record_preflight();
            return Ok(preflight_response());
        }

        if method != Method::GET && method != Method::HEAD {
            self.metrics.record_rejected();
            return Err(MirrorError::MethodNotAllowed(method.to_string()));
        }

        let upstream_path = target
            .path
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or("");
        let policy = classify(upstream_path, &self.config);

        let accept_encoding = headers
            .get(ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let date_tag = date_version(Utc::now());
        let initial_key = build_key(url, accept_encoding, Some(&date_tag));
        let is_range = headers.contains_key(RANGE);

        // Range requests bypass the cache entirely: stored entries are whole
        // bodies and must never answer a partial-content request.
        if method == Method::GET && !is_range {
            match self.store.get(&initial_key).await {
                Ok(Some(cached)) => {
                    self.metrics.record_cache_hit();
                    self.metrics.record_bytes_sent(cached.body.len() as u64);
                    debug!(key = %initial_key, "cache hit");
                    return Ok(cached_to_response(cached, &policy, started));
                }
                Ok(None) => {
                    self.metrics.record_cache_miss();
                }
                Err(e) => {
                    // Store failures degrade to pass-through
                    warn!(error = %e, "cache lookup failed, fetching upstream");
                    self.metrics.record_cache_miss();
                }
            }
        }

        let upstream_url = compose_upstream_url(&target.full_url, url.query());
        let forward_headers = filter_forward_headers(headers);

        let response = self
            .fetcher
            .fetch_with_retry(method.clone(), &upstream_url, forward_headers)
            .await
            .map_err(|e| {
                self.metrics.record_upstream(false);
                e
            })?;

        let status =
            StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        self.metrics.record_upstream(status.is_success());
        let upstream_headers = response.headers().clone();

        // Re-key under the upstream validator when the policy wants one;
        // the initial date-keyed probe and the validator-keyed write are
        // deliberately different keys. The tag that ends up in the key is
        // surfaced to the client as X-Mirror-Version.
        let validator = if policy.use_validator {
            upstream_headers
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .and_then(normalize_validator)
        } else {
            None
        };
        let (final_key, version_tag) = match validator {
            Some(tag) => (build_key(url, accept_encoding, Some(&tag)), tag),
            None => (initial_key.clone(), date_tag),
        };

        let body = response
            .bytes()
            .await
            .map_err(|e| MirrorError::UpstreamError(format!("reading upstream body: {}", e)))?;
        self.metrics.record_bytes_sent(body.len() as u64);

        let mut response_headers = rewrite_headers(upstream_headers, &policy, &self.config);
        response_headers.insert(X_CACHE_STATUS, HeaderValue::from_static("MISS"));
        insert_str(&mut response_headers, X_MIRROR_VERSION, &version_tag);
        insert_str(&mut response_headers, X_UPSTREAM_URL, &upstream_url);
        insert_response_time(&mut response_headers, started);

        if method == Method::GET && status == StatusCode::OK && !is_range {
            let entry = CachedResponse {
                status: status.as_u16(),
                headers: response_headers.clone(),
                body: body.clone(),
            };
            let store = Arc::clone(&self.store);
            let key = final_key.clone();
            let ttl = Duration::from_secs(policy.edge_ttl);
            tokio::spawn(async move {
                if let Err(e) = store.put(&key, entry, ttl).await {
                    warn!(key = %key, error = %e, "async cache write failed");
                }
            });
        }

        info!(
            method = %method,
            path = %url.path(),
            upstream = %upstream_url,
            status = %status,
            policy = policy.label.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request proxied"
        );

        Ok(ProxyResponse {
            status,
            headers: response_headers,
            body,
        })
    }
}

/// 204 answer for CORS preflights
fn preflight_response() -> ProxyResponse {
    let mut headers = HeaderMap::new();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,HEAD,OPTIONS"),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));

    ProxyResponse {
        status: StatusCode::NO_CONTENT,
        headers,
        body: Bytes::new(),
    }
}

/// Serve a stored entry, refreshing the per-request headers
fn cached_to_response(cached: CachedResponse, policy: &CachePolicy, started: Instant) -> ProxyResponse {
    let mut headers = cached.headers;
    headers.insert(X_CACHE_STATUS, HeaderValue::from_static("HIT"));
    if let Ok(value) = HeaderValue::from_str(policy.label.as_str()) {
        headers.insert(X_CACHE_POLICY, value);
    }
    insert_response_time(&mut headers, started);

    ProxyResponse {
        status: StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK),
        headers,
        body: cached.body,
    }
}

/// Append the inbound query string to the composed upstream URL
fn compose_upstream_url(full_url: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => {
            let separator = if full_url.contains('?') { '&' } else { '?' };
            format!("{}{}{}", full_url, separator, q)
        }
        _ => full_url.to_string(),
    }
}

/// Keep only the whitelisted request headers for the upstream fetch
fn filter_forward_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for name in FORWARDED_HEADERS {
        if let Some(value) = headers.get(&name) {
            forwarded.insert(name, value.clone());
        }
    }
    forwarded
}

/// Rewrite upstream headers for the client: drop hop-by-hop headers, then
/// stamp caching, CORS, and diagnostic headers per policy
fn rewrite_headers(
    mut headers: HeaderMap,
    policy: &CachePolicy,
    config: &MirrorConfig,
) -> HeaderMap {
    headers.remove(CONNECTION);
    headers.remove(TRANSFER_ENCODING);
    headers.remove(CONTENT_LENGTH);
    headers.remove(HeaderName::from_static("keep-alive"));

    let cache_control = format!(
        "public, max-age={}, s-maxage={}, stale-while-revalidate={}",
        policy.browser_ttl, policy.edge_ttl, config.swr_seconds
    );
    insert_str(&mut headers, CACHE_CONTROL, &cache_control);

    let vary = match headers.get(VARY).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.to_ascii_lowercase().contains("accept-encoding") => {
            format!("Accept-Encoding, {}", existing)
        }
        Some(existing) => existing.to_string(),
        None => "Accept-Encoding".to_string(),
    };
    insert_str(&mut headers, VARY, &vary);

    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_static("*"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
    if let Ok(value) = HeaderValue::from_str(policy.label.as_str()) {
        headers.insert(X_CACHE_POLICY, value);
    }

    headers
}

fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

fn insert_response_time(headers: &mut HeaderMap, started: Instant) {
    let elapsed = format!("{}ms", started.elapsed().as_millis());
    insert_str(headers, X_RESPONSE_TIME, &elapsed);
}
