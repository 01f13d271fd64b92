//! Signed name records: encoding, signing and validation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use libp2p_identity::{Keypair, PublicKey};
use serde::{Deserialize, Serialize};

use super::name::Name;

/// Largest encoded record accepted anywhere in this crate.
pub const MAX_RECORD_SIZE: usize = 10 << 10;

const SIGNATURE_PREFIX: &[u8] = b"ipns-signature:";

/// Errors encoding, decoding or validating a [`NameRecord`].
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Encoded record is over [`MAX_RECORD_SIZE`].
    #[error("record exceeds allowed size limit ({0} > {MAX_RECORD_SIZE} bytes)")]
    TooLarge(usize),

    /// Bytes are not a record.
    #[error("record could not be decoded: {0}")]
    Decode(#[source] postcard::Error),

    /// Bytes follow the encoded record.
    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    /// Record could not be encoded.
    #[error("record could not be encoded: {0}")]
    Encode(#[source] postcard::Error),

    /// Signing with the given key failed.
    #[error("record could not be signed: {0}")]
    Sign(#[from] libp2p_identity::SigningError),

    /// The embedded public key does not decode.
    #[error("record public key is invalid")]
    InvalidPublicKey,

    /// The name does not inline its key and the record does not embed one.
    #[error("public key not found in name or record")]
    PublicKeyNotFound,

    /// The embedded public key belongs to a different peer than the name.
    #[error("record public key does not match the name")]
    PublicKeyMismatch,

    /// Signature does not verify.
    #[error("record signature verification failed")]
    SignatureVerification,

    /// Validity deadline has passed.
    #[error("record has expired")]
    Expired,

    /// The record carries no TTL.
    #[error("record has no TTL")]
    NoTtl,
}

/// A signed, versioned value published under a [`Name`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    value: Vec<u8>,
    sequence: u64,
    /// End of validity, seconds since the unix epoch.
    validity: u64,
    /// Cache hint, nanoseconds.
    ttl: Option<u64>,
    public_key: Option<Vec<u8>>,
    signature: Vec<u8>,
}

#[derive(Serialize)]
struct SignedFields<'a> {
    value: &'a [u8],
    sequence: u64,
    validity: u64,
    ttl: Option<u64>,
}

impl NameRecord {
    /// Create and sign a record.
    ///
    /// The public key is embedded only when it cannot be recovered from the
    /// signer's name.
    pub fn new(
        keypair: &Keypair,
        value: impl Into<Vec<u8>>,
        sequence: u64,
        validity: SystemTime,
        ttl: Duration,
    ) -> Result<Self, RecordError> {
        let public = keypair.public();
        let inlined = Name::from_peer_id(public.to_peer_id()).public_key().is_some();
        let mut record = Self {
            value: value.into(),
            sequence,
            validity: unix_secs(validity),
            ttl: Some(u64::try_from(ttl.as_nanos()).unwrap_or(u64::MAX)),
            public_key: (!inlined).then(|| public.encode_protobuf()),
            signature: Vec::new(),
        };
        record.signature = keypair.sign(&record.signature_payload()?)?;
        Ok(record)
    }

    /// Canonical byte form.
    pub fn marshal(&self) -> Result<Vec<u8>, RecordError> {
        let bytes = postcard::to_allocvec(self).map_err(RecordError::Encode)?;
        if bytes.len() > MAX_RECORD_SIZE {
            return Err(RecordError::TooLarge(bytes.len()));
        }
        Ok(bytes)
    }

    /// Decode a record from its canonical byte form. Does not validate.
    ///
    /// The whole input must be the record; anything after it is rejected.
    pub fn unmarshal(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() > MAX_RECORD_SIZE {
            return Err(RecordError::TooLarge(bytes.len()));
        }
        let (record, rest) = postcard::take_from_bytes(bytes).map_err(RecordError::Decode)?;
        if !rest.is_empty() {
            return Err(RecordError::TrailingBytes(rest.len()));
        }
        Ok(record)
    }

    /// The published value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Sequence number; higher wins.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// End of validity.
    pub fn validity(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.validity)
    }

    /// How long resolvers may cache the record.
    pub fn ttl(&self) -> Result<Duration, RecordError> {
        self.ttl.map(Duration::from_nanos).ok_or(RecordError::NoTtl)
    }

    fn signature_payload(&self) -> Result<Vec<u8>, RecordError> {
        let fields = SignedFields {
            value: &self.value,
            sequence: self.sequence,
            validity: self.validity,
            ttl: self.ttl,
        };
        let mut payload = SIGNATURE_PREFIX.to_vec();
        payload.extend(postcard::to_allocvec(&fields).map_err(RecordError::Encode)?);
        Ok(payload)
    }

    fn verifying_key(&self, name: &Name) -> Result<PublicKey, RecordError> {
        if let Some(key) = name.public_key() {
            return Ok(key);
        }
        let bytes = self
            .public_key
            .as_deref()
            .ok_or(RecordError::PublicKeyNotFound)?;
        let key =
            PublicKey::try_decode_protobuf(bytes).map_err(|_| RecordError::InvalidPublicKey)?;
        if key.to_peer_id() != name.peer_id() {
            return Err(RecordError::PublicKeyMismatch);
        }
        Ok(key)
    }
}

/// Check that `record` is a currently valid record for `name`.
///
/// Verifies the encoded size, that the signing key belongs to `name`, the
/// signature, and the validity deadline.
pub fn validate_with_name(record: &NameRecord, name: &Name) -> Result<(), RecordError> {
    record.marshal()?;
    let key = record.verifying_key(name)?;
    if !key.verify(&record.signature_payload()?, &record.signature) {
        return Err(RecordError::SignatureVerification);
    }
    if record.validity() <= SystemTime::now() {
        return Err(RecordError::Expired);
    }
    Ok(())
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
