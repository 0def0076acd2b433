//! Inbound HTTP surface
//!
//! A plain hyper 1.x server: accept loop, one spawned task per connection,
//! each request reconstructed into a URL and handed to the orchestrator.

use crate::error::{MirrorError, Result};
use crate::proxy::{MirrorProxy, ProxyResponse};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use url::Url;

/// Plaintext help returned for malformed paths
const USAGE: &str = "forge-mirror: reverse-proxy cache for source-forge content

Request one of:
  /<user>/<repo>/...                      bare path, served from the primary host
  /<host>/<user>/<repo>/...               host-prefixed path (allow-listed hosts only)
  /https://<host>/<user>/<repo>/...       full URL embedded in the path

Example:
  /octocat/Hello-World/main/README.md
";

/// HTTP front end binding the orchestrator to a socket
pub struct MirrorServer {
    proxy: Arc<MirrorProxy>,
    addr: SocketAddr,
}

impl MirrorServer {
    pub fn new(proxy: Arc<MirrorProxy>, listen_address: &str) -> Result<Self> {
        let addr = listen_address.parse().map_err(|e| {
            MirrorError::ConfigError(format!("invalid listen address '{}': {}", listen_address, e))
        })?;
        Ok(MirrorServer { proxy, addr })
    }

    /// Accept connections until the process is stopped
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            MirrorError::ConfigError(format!("failed to bind {}: {}", self.addr, e))
        })?;
        info!(addr = %self.addr, "mirror listening");

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };

            let proxy = Arc::clone(&self.proxy);
            let io = TokioIo::new(stream);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let proxy = Arc::clone(&proxy);
                    async move { handle_request(proxy, req).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(peer = %peer, error = %e, "connection error");
                }
            });
        }
    }
}

/// Serve one request: reconstruct the inbound URL, delegate, serialize
async fn handle_request(
    proxy: Arc<MirrorProxy>,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
        .to_string();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();

    let url = match Url::parse(&format!("http://{}{}", host, path_and_query)) {
        Ok(url) => url,
        Err(e) => {
            warn!(path = %path_and_query, error = %e, "unparseable request URL");
            return Ok(error_response(&MirrorError::InvalidPath(
                path_and_query.clone(),
            )));
        }
    };

    match proxy.handle(req.method(), &url, req.headers()).await {
        Ok(proxied) => Ok(to_hyper_response(proxied)),
        Err(e) => {
            if !e.is_user_error() {
                error!(path = %path_and_query, error = %e, "request failed");
            }
            Ok(error_response(&e))
        }
    }
}

fn to_hyper_response(proxied: ProxyResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(proxied.body));
    *response.status_mut() = proxied.status;
    *response.headers_mut() = proxied.headers;
    response
}

/// Map an internal error to a plaintext HTTP error response
///
/// User-input errors get the usage text so a curl user can self-correct.
fn error_response(e: &MirrorError) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(e.to_http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = if e.is_user_error() {
        format!("{}\n\n{}", e, USAGE)
    } else {
        e.to_string()
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, http::HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status_and_body() {
        let response = error_response(&MirrorError::InvalidPath("empty path".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_response(&MirrorError::Timeout("upstream".into()));
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let response = error_response(&MirrorError::UpstreamError("refused".into()));
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_invalid_listen_address_rejected() {
        use crate::config::MirrorConfig;
        use crate::metrics::MirrorMetrics;
        use crate::store::MemoryStore;

        let proxy = MirrorProxy::new(
            Arc::new(MirrorConfig::default()),
            Arc::new(MemoryStore::new()),
            Arc::new(MirrorMetrics::new()),
        )
        .unwrap();

        let result = MirrorServer::new(Arc::new(proxy), "not-an-address");
        assert!(matches!(result, Err(MirrorError::ConfigError(_))));
    }
}
