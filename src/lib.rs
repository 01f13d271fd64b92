//! Delegated content routing over HTTP.
//!
//! The [`server`] module exposes provider lookups and name-record
//! publication for any [`RoutingBackend`] under `/routing/v1`. The
//! [`contentrouter`] module goes the other way and turns a routing client
//! into a local [`ContentRouting`] implementation.

#![deny(missing_docs)]

pub mod contentrouter;
pub mod error;
pub mod ipns;
pub mod iter;
pub mod server;
pub mod types;

// Re-export key types
pub use contentrouter::{AddrInfo, Client, ContentRouter, ContentRouterConfig, ContentRouting};
pub use error::{Error, Result};
pub use ipns::{Name, NameRecord};
pub use iter::ResultIter;
pub use server::{RoutingBackend, RoutingServer, ServerConfig, ServerGuard};
pub use types::{PeerRecord, Record, UnknownRecord};

// Re-export the identity and addressing crates used in public signatures
pub use cid;
pub use libp2p_identity;
pub use multiaddr;
