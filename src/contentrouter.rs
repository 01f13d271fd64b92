//! Content routing on top of a delegated routing client.
//!
//! [`ContentRouter`] lets code written against [`ContentRouting`] use a
//! remote routing service as if it were a local routing table. Provider
//! lookups are pulled from the client's [`ResultIter`] by a background task
//! and pushed to the caller as [`AddrInfo`]s over a channel.

use std::sync::Arc;

use async_trait::async_trait;
use cid::Cid;
use futures_util::StreamExt;
use libp2p_identity::PeerId;
use multiaddr::Multiaddr;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::iter::ResultIter;
use crate::types::{Record, SCHEMA_PEER};

/// Channel capacity between the lookup task and the caller.
const PROVIDER_BUFFER: usize = 1;

/// A peer and the addresses it can be dialed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrInfo {
    /// Peer identity.
    pub id: PeerId,
    /// Known addresses, possibly empty.
    pub addrs: Vec<Multiaddr>,
}

/// Anything that can look up the providers of a key.
#[async_trait]
pub trait Client: Send + Sync + 'static {
    /// Start a provider lookup for `key`.
    async fn find_providers(&self, key: &Cid) -> anyhow::Result<ResultIter<Record>>;
}

#[async_trait]
impl<T: Client + ?Sized> Client for Arc<T> {
    async fn find_providers(&self, key: &Cid) -> anyhow::Result<ResultIter<Record>> {
        (**self).find_providers(key).await
    }
}

/// Local content routing interface.
#[async_trait]
pub trait ContentRouting {
    /// Announce that this node can provide `key`.
    async fn provide(&self, key: &Cid, announce: bool) -> Result<()>;

    /// Look up providers of `key`. The channel closes when the lookup ends.
    async fn find_providers_async(&self, key: &Cid, num_results: usize)
        -> mpsc::Receiver<AddrInfo>;
}

/// Limits for bulk provider announcements.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContentRouterConfig {
    /// Announcements in flight at once.
    pub max_provide_concurrency: usize,
    /// Keys per announcement batch.
    pub max_provide_batch_size: usize,
}

impl Default for ContentRouterConfig {
    fn default() -> Self {
        Self {
            max_provide_concurrency: 5,
            max_provide_batch_size: 100,
        }
    }
}

impl ContentRouterConfig {
    /// Set the announcement concurrency.
    pub fn max_provide_concurrency(mut self, max: usize) -> Self {
        self.max_provide_concurrency = max;
        self
    }

    /// Set the announcement batch size.
    pub fn max_provide_batch_size(mut self, max: usize) -> Self {
        self.max_provide_batch_size = max;
        self
    }
}

/// [`ContentRouting`] backed by a delegated routing [`Client`].
pub struct ContentRouter<C> {
    client: C,
    config: ContentRouterConfig,
}

impl<C: Client> ContentRouter<C> {
    /// Wrap `client`.
    pub fn new(client: C, config: ContentRouterConfig) -> Self {
        Self { client, config }
    }

    /// Announcement limits.
    pub fn config(&self) -> &ContentRouterConfig {
        &self.config
    }

    /// Whether bulk announcements can be accepted. Always `true`.
    pub fn ready(&self) -> bool {
        true
    }
}

#[async_trait]
impl<C: Client> ContentRouting for ContentRouter<C> {
    async fn provide(&self, _key: &Cid, _announce: bool) -> Result<()> {
        Err(Error::NotSupported)
    }

    async fn find_providers_async(
        &self,
        key: &Cid,
        _num_results: usize,
    ) -> mpsc::Receiver<AddrInfo> {
        let (tx, rx) = mpsc::channel(PROVIDER_BUFFER);
        match self.client.find_providers(key).await {
            Ok(records) => {
                tokio::spawn(read_provider_responses(tx, records));
            }
            Err(e) => {
                warn!(%key, error = ?e, "error finding providers");
            }
        }
        rx
    }
}

/// Forward the peer records of `records` to `tx`, dropping everything else.
///
/// The sequence is released before the channel closes.
async fn read_provider_responses(tx: mpsc::Sender<AddrInfo>, mut records: ResultIter<Record>) {
    // TODO: stop pulling once the receiver is gone instead of draining.
    while let Some(res) = records.next().await {
        let record = match res {
            Ok(record) => record,
            Err(e) => {
                warn!(error = ?e, "error iterating provider responses");
                continue;
            }
        };
        if record.schema() != SCHEMA_PEER {
            debug!(schema = record.schema(), "skipping non-peer provider record");
            continue;
        }
        let Some(peer) = record.into_peer() else {
            error!(schema = SCHEMA_PEER, "problem casting find providers result");
            continue;
        };
        let info = AddrInfo {
            id: peer.id,
            addrs: peer.addrs,
        };
        if tx.send(info).await.is_err() {
            debug!("provider receiver dropped");
        }
    }
    // parameters drop in reverse order: `records` first, then `tx`
}
