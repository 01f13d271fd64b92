//! Discovery records returned by provider lookups.

use std::fmt;

use libp2p_identity::PeerId;
use multiaddr::Multiaddr;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

/// Schema tag of [`PeerRecord`].
pub const SCHEMA_PEER: &str = "peer";

/// A peer that can serve the requested content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Always [`SCHEMA_PEER`].
    #[serde(rename = "Schema")]
    pub schema: String,
    /// Peer identity.
    #[serde(rename = "ID")]
    pub id: PeerId,
    /// Known addresses of the peer.
    #[serde(rename = "Addrs", default, skip_serializing_if = "Vec::is_empty")]
    pub addrs: Vec<Multiaddr>,
    /// Transfer protocols the peer speaks.
    #[serde(rename = "Protocols", default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
}

impl PeerRecord {
    /// Create a peer record with the given addresses.
    pub fn new(id: PeerId, addrs: Vec<Multiaddr>) -> Self {
        Self {
            schema: SCHEMA_PEER.to_string(),
            id,
            addrs,
            protocols: Vec::new(),
        }
    }

    /// Set the advertised protocols.
    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }
}

/// A record with a schema this crate does not interpret.
///
/// The JSON payload is kept as received and written back byte-for-byte.
#[derive(Debug, Clone)]
pub struct UnknownRecord {
    schema: String,
    raw: Box<RawValue>,
}

impl UnknownRecord {
    /// Parse an opaque record from its JSON text. The object must carry a
    /// string `Schema` field.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let raw = RawValue::from_string(json.to_string())?;
        let SchemaTag { schema } = serde_json::from_str(raw.get())?;
        Ok(Self { schema, raw })
    }

    /// The schema tag.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// The verbatim JSON payload.
    pub fn as_json(&self) -> &str {
        self.raw.get()
    }
}

impl PartialEq for UnknownRecord {
    fn eq(&self, other: &Self) -> bool {
        self.raw.get() == other.raw.get()
    }
}

impl Eq for UnknownRecord {}

/// One result of a provider lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A [`SCHEMA_PEER`] record.
    Peer(PeerRecord),
    /// Any other schema, carried opaquely.
    Unknown(UnknownRecord),
}

impl Record {
    /// The schema tag of this record.
    pub fn schema(&self) -> &str {
        match self {
            Record::Peer(p) => &p.schema,
            Record::Unknown(u) => &u.schema,
        }
    }

    /// Borrow the concrete peer record, if this is one.
    pub fn as_peer(&self) -> Option<&PeerRecord> {
        match self {
            Record::Peer(p) => Some(p),
            Record::Unknown(_) => None,
        }
    }

    /// Take the concrete peer record, if this is one.
    pub fn into_peer(self) -> Option<PeerRecord> {
        match self {
            Record::Peer(p) => Some(p),
            Record::Unknown(_) => None,
        }
    }
}

impl From<PeerRecord> for Record {
    fn from(record: PeerRecord) -> Self {
        Record::Peer(record)
    }
}

impl From<UnknownRecord> for Record {
    fn from(record: UnknownRecord) -> Self {
        Record::Unknown(record)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Peer(p) => write!(f, "{}({})", p.schema, p.id),
            Record::Unknown(u) => write!(f, "{}(opaque)", u.schema),
        }
    }
}

#[derive(Deserialize)]
struct SchemaTag {
    #[serde(rename = "Schema")]
    schema: String,
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Record::Peer(p) => p.serialize(serializer),
            Record::Unknown(u) => u.raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let SchemaTag { schema } = serde_json::from_str(raw.get()).map_err(D::Error::custom)?;
        if schema == SCHEMA_PEER {
            let peer = serde_json::from_str(raw.get()).map_err(D::Error::custom)?;
            Ok(Record::Peer(peer))
        } else {
            Ok(Record::Unknown(UnknownRecord { schema, raw }))
        }
    }
}
