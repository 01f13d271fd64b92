//! JSON response bodies and the marshal helper every body goes through.

use serde::{Deserialize, Serialize};

use super::record::Record;

/// Body of a bulk (`application/json`) provider lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersResponse {
    /// Records in the order the backend produced them.
    #[serde(rename = "Providers", default)]
    pub providers: Vec<Record>,
}

/// Marshal a value to compact JSON.
///
/// Output is deterministic for a given value: field order follows the type
/// definitions, nothing is HTML-escaped and no trailing newline is added.
/// Clients may hash response bodies, so every JSON byte this crate writes
/// goes through here.
pub fn marshal<T: Serialize + ?Sized>(val: &T) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(val)
}
