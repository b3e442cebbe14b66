//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the server pool and start its watcher
//! - Build the backend connector and the allocator
//! - Install the metrics exporter when enabled
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last (traffic only when the pool is loaded)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::allocator::{Allocator, AllocatorSettings};
use crate::backend::{BackendError, OutlineConnector};
use crate::config::AllocatorConfig;
use crate::http::HttpServer;
use crate::lifecycle::{shutdown_on_signal, Shutdown};
use crate::observability::metrics::init_metrics;
use crate::pool::{PoolError, PoolWatcher, ServerPool};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("server pool: {0}")]
    Pool(#[from] PoolError),

    #[error("backend client: {0}")]
    Backend(#[from] BackendError),

    #[error("invalid {field} address {value:?}")]
    Address { field: &'static str, value: String },

    #[error("metrics exporter: {0}")]
    Metrics(String),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The running allocator and the watcher keeping its pool fresh.
pub struct Components {
    pub allocator: Arc<Allocator>,
    pub watcher: PoolWatcher,
}

/// Open the pool, start watching it and wire up an allocator over
/// Outline backends.
pub fn build_allocator(config: &AllocatorConfig) -> Result<Components, StartupError> {
    let pool = Arc::new(ServerPool::open(&config.pool.servers_file)?);
    let snapshot = pool.current();
    tracing::info!(
        servers_file = %config.pool.servers_file,
        servers = snapshot.len(),
        version = snapshot.version(),
        "Server pool loaded"
    );

    let watcher = PoolWatcher::start(pool.clone())?;

    let settings = AllocatorSettings::from_config(config);
    let connector = OutlineConnector::new(&config.backend, settings.probe_timeout)?;
    let allocator = Arc::new(Allocator::new(pool, Arc::new(connector), settings));

    Ok(Components { allocator, watcher })
}

/// Run the service until SIGINT/SIGTERM.
pub async fn run(config: AllocatorConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address {
                field: "metrics",
                value: config.observability.metrics_address.clone(),
            })?;
        init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))?;
    }

    let Components { allocator, mut watcher } = build_allocator(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(allocator, Duration::from_secs(config.timeouts.request_secs));
    let result = server.run(listener, shutdown.subscribe()).await;

    watcher.stop();
    tracing::info!("Shutdown complete");
    result.map_err(StartupError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_servers_file_is_fatal() {
        let mut config = AllocatorConfig::default();
        config.pool.servers_file = std::env::temp_dir()
            .join(format!("missing-{}.json", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned();

        assert!(matches!(build_allocator(&config), Err(StartupError::Pool(_))));
    }

    #[tokio::test]
    async fn test_build_allocator_loads_pool() {
        let path = std::env::temp_dir().join(format!("servers-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"servers": ["https://10.0.0.1:1234/a", "https://10.0.0.2:1234/b"]}"#).unwrap();

        let mut config = AllocatorConfig::default();
        config.pool.servers_file = path.to_string_lossy().into_owned();

        let mut components = build_allocator(&config).unwrap();
        assert_eq!(components.allocator.pool().current().len(), 2);
        assert!(components.watcher.is_running());

        components.watcher.stop();
        let _ = std::fs::remove_file(&path);
    }
}
