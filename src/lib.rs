//! forge-mirror: a caching reverse proxy for source-forge content
//!
//! The mirror accepts requests whose path names a file on one of a fixed set
//! of allow-listed source hosts, fetches it upstream with bounded retries,
//! and serves it with caching and CORS headers chosen by the shape of the
//! path. Responses are cached under versioned keys so tagged releases stick
//! for a month while branch heads refresh within the hour.
//!
//! Components:
//! - [`config`]: YAML configuration with validated defaults
//! - [`resolver`]: inbound path to upstream target resolution
//! - [`strategy`]: path-shape classification into caching policies
//! - [`cache_key`]: versioned cache-key construction
//! - [`fetcher`]: upstream HTTP client with retry
//! - [`store`]: the response cache behind a swappable trait
//! - [`proxy`]: per-request orchestration
//! - [`server`]: the inbound hyper surface

pub mod cache_key;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod proxy;
pub mod resolver;
pub mod server;
pub mod store;
pub mod strategy;

pub use cache_key::{build_key, date_version, encoding_tag, normalize_validator};
pub use config::MirrorConfig;
pub use error::{MirrorError, Result};
pub use fetcher::UpstreamFetcher;
pub use metrics::{MetricsSnapshot, MirrorMetrics};
pub use proxy::{MirrorProxy, ProxyResponse};
pub use resolver::{resolve, SourceTarget};
pub use server::MirrorServer;
pub use store::{CachedResponse, MemoryStore, ResponseStore, StoreStats};
pub use strategy::{classify, CachePolicy, PolicyLabel};
