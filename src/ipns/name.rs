//! Routing names: the key a name record is filed under.

use std::fmt;
use std::str::FromStr;

use cid::multihash::Multihash;
use cid::Cid;
use libp2p_identity::{PeerId, PublicKey};

/// Multicodec of CIDs that carry a libp2p public key.
pub const LIBP2P_KEY_CODEC: u64 = 0x72;

/// Multihash code of the identity hash.
const IDENTITY_HASH_CODE: u64 = 0x00;

/// Errors deriving a [`Name`].
#[derive(Debug, thiserror::Error)]
pub enum NameError {
    /// The CID does not use the libp2p-key codec.
    #[error("CID codec {0:#x} is not libp2p-key")]
    WrongCodec(u64),

    /// The key is hashed, so the public key cannot be recovered from it.
    #[error("multihash code {0:#x} is not the identity hash")]
    NotIdentityHash(u64),

    /// The identity digest is not a protobuf-encoded public key.
    #[error("identity digest is not a valid peer ID")]
    InvalidPeerId,

    /// The text form did not decode as a CID.
    #[error("unable to parse CID: {0}")]
    Cid(#[from] cid::Error),
}

/// Name a record is published under, derived 1:1 from a peer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Name(PeerId);

impl Name {
    /// Derive a name from a routing key.
    ///
    /// Only `libp2p-key` CIDs over an identity multihash are accepted: the
    /// public key must be recoverable from the name itself.
    pub fn from_cid(cid: &Cid) -> Result<Self, NameError> {
        if cid.codec() != LIBP2P_KEY_CODEC {
            return Err(NameError::WrongCodec(cid.codec()));
        }
        let hash = cid.hash();
        if hash.code() != IDENTITY_HASH_CODE {
            return Err(NameError::NotIdentityHash(hash.code()));
        }
        if PublicKey::try_decode_protobuf(hash.digest()).is_err() {
            return Err(NameError::InvalidPeerId);
        }
        let peer_id = PeerId::from_multihash(*hash).map_err(|_| NameError::InvalidPeerId)?;
        Ok(Self(peer_id))
    }

    /// Name of a peer.
    pub fn from_peer_id(peer_id: PeerId) -> Self {
        Self(peer_id)
    }

    /// The peer identity behind this name.
    pub fn peer_id(&self) -> PeerId {
        self.0
    }

    /// The routing key for this name.
    pub fn to_cid(&self) -> Cid {
        let hash: Multihash<64> = self.0.into();
        Cid::new_v1(LIBP2P_KEY_CODEC, hash)
    }

    /// The public key inlined in the name, when the peer ID uses the
    /// identity hash.
    pub fn public_key(&self) -> Option<PublicKey> {
        let hash: Multihash<64> = self.0.into();
        if hash.code() != IDENTITY_HASH_CODE {
            return None;
        }
        PublicKey::try_decode_protobuf(hash.digest()).ok()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_cid())
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cid = Cid::try_from(s)?;
        Self::from_cid(&cid)
    }
}

#[cfg(test)]
mod tests {
    use libp2p_identity::Keypair;

    use super::*;

    #[test]
    fn round_trips_through_cid_text() {
        let keypair = Keypair::generate_ed25519();
        let name = Name::from_peer_id(keypair.public().to_peer_id());
        let text = name.to_string();
        let parsed: Name = text.parse().unwrap();
        assert_eq!(parsed, name);
        assert_eq!(parsed.public_key(), Some(keypair.public()));
    }

    #[test]
    fn rejects_other_codecs() {
        let keypair = Keypair::generate_ed25519();
        let hash: Multihash<64> = keypair.public().to_peer_id().into();
        let raw = Cid::new_v1(0x55, hash);
        assert!(matches!(Name::from_cid(&raw), Err(NameError::WrongCodec(0x55))));
    }

    #[test]
    fn rejects_hashed_keys() {
        let hashed = Multihash::<64>::wrap(0x12, &[9u8; 32]).unwrap();
        let cid = Cid::new_v1(LIBP2P_KEY_CODEC, hashed);
        assert!(matches!(
            Name::from_cid(&cid),
            Err(NameError::NotIdentityHash(0x12))
        ));
    }

    #[test]
    fn rejects_garbage_identity_digest() {
        let garbage = Multihash::<64>::wrap(IDENTITY_HASH_CODE, b"not a key").unwrap();
        let cid = Cid::new_v1(LIBP2P_KEY_CODEC, garbage);
        assert!(matches!(Name::from_cid(&cid), Err(NameError::InvalidPeerId)));
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(matches!("not-a-cid".parse::<Name>(), Err(NameError::Cid(_))));
    }
}
