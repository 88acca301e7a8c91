//! Core domain types: the database descriptor and the database wrapping key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroize;

/// Byte length of a database wrapping key (32 bytes = 256 bits).
pub const DB_KEY_LEN: usize = 32;

/// Errors from constructing a [`DbKey`].
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key material has an unexpected length.
    #[error("database key has invalid length: expected {DB_KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// A 256-bit database wrapping key obtained from the key manager.
///
/// Cloned into call stacks for the duration of a single encrypt/decrypt.
/// When this type is dropped, the memory is overwritten with zeroes to
/// minimise the window during which key material lives in RAM.
#[derive(Clone)]
pub struct DbKey(Box<[u8; DB_KEY_LEN]>);

impl DbKey {
    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; DB_KEY_LEN] {
        &self.0
    }

    /// Construct a key from a byte slice of exactly [`DB_KEY_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] if the slice has the wrong length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != DB_KEY_LEN {
            return Err(KeyError::InvalidLength(bytes.len()));
        }
        let mut buf = Box::new([0u8; DB_KEY_LEN]);
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }
}

impl From<[u8; DB_KEY_LEN]> for DbKey {
    fn from(bytes: [u8; DB_KEY_LEN]) -> Self {
        Self(Box::new(bytes))
    }
}

impl Drop for DbKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for DbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material — not even in debug builds.
        f.write_str("DbKey([REDACTED])")
    }
}

/// Descriptor of a database handed to the key service by callers.
///
/// Only the `uuid` field has meaning to the key service; the remaining
/// properties are an opaque bag forwarded verbatim to the key manager
/// provider (credentials, tenant hints, whatever the provider needs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    uuid: Uuid,
    #[serde(flatten)]
    props: Map<String, Value>,
}

impl Database {
    /// Create a descriptor carrying only the database identity.
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            props: Map::new(),
        }
    }

    /// Create a descriptor with provider-specific properties attached.
    pub fn with_props(uuid: Uuid, props: Map<String, Value>) -> Self {
        Self { uuid, props }
    }

    /// The database identity.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Look up a provider-specific property by name.
    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }
}
