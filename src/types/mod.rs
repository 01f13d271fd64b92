//! Wire types shared by the server and the content-routing adapter.

pub mod json;
pub mod record;

pub use json::ProvidersResponse;
pub use record::{PeerRecord, Record, UnknownRecord, SCHEMA_PEER};
