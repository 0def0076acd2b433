use forge_mirror::{MemoryStore, MirrorConfig, MirrorMetrics, MirrorProxy, MirrorServer};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "mirror.yaml".to_string());
    let explicit = std::env::args().nth(1).is_some();

    let config = if Path::new(&config_path).exists() {
        match MirrorConfig::from_file(&config_path) {
            Ok(config) => {
                info!(path = %config_path, "loaded configuration");
                config
            }
            Err(e) => {
                error!(path = %config_path, error = %e, "failed to load configuration");
                std::process::exit(1);
            }
        }
    } else if explicit {
        error!(path = %config_path, "configuration file not found");
        std::process::exit(1);
    } else {
        info!("no mirror.yaml found, using built-in defaults");
        MirrorConfig::default()
    };

    info!(
        listen = %config.listen_address,
        primary_host = %config.primary_host(),
        hosts = config.allowed_hosts.len(),
        max_retries = config.max_retries,
        timeout_ms = config.request_timeout_ms,
        "starting forge-mirror"
    );

    let store = match config.store_max_bytes {
        Some(max) => Arc::new(MemoryStore::with_max_size(max)),
        None => Arc::new(MemoryStore::new()),
    };
    let metrics = Arc::new(MirrorMetrics::new());

    let proxy = match MirrorProxy::new(Arc::new(config.clone()), store, metrics) {
        Ok(proxy) => Arc::new(proxy),
        Err(e) => {
            error!(error = %e, "failed to initialize proxy");
            std::process::exit(1);
        }
    };

    let server = match MirrorServer::new(proxy, &config.listen_address) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to initialize server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!(error = %e, "server exited");
        std::process::exit(1);
    }
}
