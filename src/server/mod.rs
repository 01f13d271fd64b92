//! HTTP side of delegated routing.
//!
//! [`RoutingServer`] exposes a [`RoutingBackend`] under `/routing/v1`:
//!
//! ```no_run
//! use delegated_routing_http::server::{RoutingBackend, RoutingServer, ServerConfig};
//!
//! # async fn run(backend: impl RoutingBackend) -> Result<(), Box<dyn std::error::Error>> {
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//! let guard = RoutingServer::new(backend)
//!     .config(ServerConfig::default().with_streaming_disabled(false))
//!     .serve(listener)
//!     .await?;
//! println!("listening on {}", guard.local_addr());
//! // ... later
//! guard.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Use [`RoutingServer::router`] instead to mount the endpoints into a larger
//! `axum` application.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use cid::Cid;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::ipns::{Name, NameRecord};
use crate::iter::ResultIter;
use crate::types::Record;

mod ipns;
pub mod negotiate;
mod providers;
mod response;

/// Plain JSON.
pub const MEDIA_TYPE_JSON: &str = "application/json";
/// Newline-delimited JSON.
pub const MEDIA_TYPE_NDJSON: &str = "application/x-ndjson";
/// Accept-anything.
pub const MEDIA_TYPE_WILDCARD: &str = "*/*";
/// Encoded [`NameRecord`] bytes.
pub const MEDIA_TYPE_IPNS_RECORD: &str = "application/vnd.ipfs.ipns-record";

/// Provider lookups.
pub const FIND_PROVIDERS_PATH: &str = "/routing/v1/providers/{cid}";
/// Name record retrieval and publication.
pub const IPNS_PATH: &str = "/routing/v1/ipns/{cid}";

/// Backend result limit for buffered JSON responses.
pub const DEFAULT_RECORDS_LIMIT: usize = 20;
/// Backend result limit for streamed responses; 0 is unbounded.
pub const DEFAULT_STREAMING_RECORDS_LIMIT: usize = 0;
/// `Cache-Control` lifetime for records that carry no TTL.
pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(60);

/// The routing system the server delegates to.
///
/// Errors are rendered with their full context chain in 500 responses.
#[async_trait]
pub trait RoutingBackend: Send + Sync + 'static {
    /// Providers of `key`. A `limit` of 0 means no limit.
    async fn find_providers(&self, key: Cid, limit: usize) -> anyhow::Result<ResultIter<Record>>;

    /// Current record published under `name`.
    async fn find_ipns_record(&self, name: &Name) -> anyhow::Result<NameRecord>;

    /// Store `record` under `name`. The record has already been validated.
    async fn provide_ipns_record(&self, name: &Name, record: &NameRecord) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: RoutingBackend + ?Sized> RoutingBackend for Arc<T> {
    async fn find_providers(&self, key: Cid, limit: usize) -> anyhow::Result<ResultIter<Record>> {
        (**self).find_providers(key, limit).await
    }

    async fn find_ipns_record(&self, name: &Name) -> anyhow::Result<NameRecord> {
        (**self).find_ipns_record(name).await
    }

    async fn provide_ipns_record(&self, name: &Name, record: &NameRecord) -> anyhow::Result<()> {
        (**self).provide_ipns_record(name, record).await
    }
}

/// Server behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Never answer provider lookups with NDJSON.
    pub streaming_disabled: bool,
    /// Backend limit for buffered JSON responses.
    pub records_limit: usize,
    /// Backend limit for NDJSON responses; 0 is unbounded.
    pub streaming_records_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            streaming_disabled: false,
            records_limit: DEFAULT_RECORDS_LIMIT,
            streaming_records_limit: DEFAULT_STREAMING_RECORDS_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Turn NDJSON responses off or on.
    pub fn with_streaming_disabled(mut self, disabled: bool) -> Self {
        self.streaming_disabled = disabled;
        self
    }

    /// Set the buffered JSON result limit.
    pub fn records_limit(mut self, limit: usize) -> Self {
        self.records_limit = limit;
        self
    }

    /// Set the NDJSON result limit.
    pub fn streaming_records_limit(mut self, limit: usize) -> Self {
        self.streaming_records_limit = limit;
        self
    }
}

pub(crate) struct ServerState {
    pub(crate) backend: Arc<dyn RoutingBackend>,
    pub(crate) config: ServerConfig,
}

/// Builder for the routing HTTP server.
pub struct RoutingServer {
    backend: Arc<dyn RoutingBackend>,
    config: ServerConfig,
}

impl RoutingServer {
    /// Serve `backend` with the default configuration.
    pub fn new<B: RoutingBackend>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            config: ServerConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// The routing endpoints as an `axum` router.
    pub fn router(self) -> Router {
        let state = Arc::new(ServerState {
            backend: self.backend,
            config: self.config,
        });
        Router::new()
            .route(FIND_PROVIDERS_PATH, get(providers::find_providers))
            .route(
                IPNS_PATH,
                get(ipns::get_ipns_record).put(ipns::put_ipns_record),
            )
            .with_state(state)
    }

    /// Serve on `listener` until the returned guard is shut down or dropped.
    pub async fn serve(self, listener: TcpListener) -> Result<ServerGuard> {
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.recv().await;
                debug!(%local_addr, "routing server shutting down");
            };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("routing server error: {e}");
            }
        });
        info!(%local_addr, "routing server listening");

        Ok(ServerGuard {
            local_addr,
            shutdown_tx,
            handle: Some(handle),
        })
    }
}

/// Guard for a running [`RoutingServer`].
pub struct ServerGuard {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ServerGuard {
    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("routing server task failed: {e}");
            }
        }
        Ok(())
    }
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ServerConfig::default();
        assert!(!config.streaming_disabled);
        assert_eq!(config.records_limit, 20);
        assert_eq!(config.streaming_records_limit, 0);
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::default()
            .with_streaming_disabled(true)
            .records_limit(5)
            .streaming_records_limit(100);
        assert!(config.streaming_disabled);
        assert_eq!(config.records_limit, 5);
        assert_eq!(config.streaming_records_limit, 100);
    }

    #[test]
    fn config_fills_missing_fields_from_defaults() {
        let config: ServerConfig = serde_json::from_str(r#"{"records_limit": 50}"#).unwrap();
        assert_eq!(config, ServerConfig::default().records_limit(50));
    }
}
