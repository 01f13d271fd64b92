//! Name records and the names they are published under.
//!
//! The server only touches records through [`NameRecord::marshal`],
//! [`NameRecord::unmarshal`], [`NameRecord::ttl`] and [`validate_with_name`].

mod name;
mod record;

pub use name::{Name, NameError, LIBP2P_KEY_CODEC};
pub use record::{validate_with_name, NameRecord, RecordError, MAX_RECORD_SIZE};
