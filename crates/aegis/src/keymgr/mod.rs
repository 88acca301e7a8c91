//! Pluggable key manager interface.
//!
//! The key manager is the external authority for database wrapping keys: a
//! KMS, an HSM, a vault — anything that can mint a key for a new database
//! and re-derive it for an existing one. The service consumes exactly two
//! operations and assumes nothing about the provider beyond them.

pub mod ephemeral;

pub use ephemeral::EphemeralKeyManager;

use aegis_common::{Database, DbKey};
use async_trait::async_trait;

/// Provider of per-database wrapping keys.
///
/// Implementations may read provider-specific fields from the database
/// descriptor's property bag; the uuid is the only field the service itself
/// interprets.
#[async_trait]
pub trait KeyManager: Send + Sync {
    /// Produce the wrapping key for a newly created database.
    ///
    /// `options` carries provider-specific creation parameters supplied by
    /// the caller and is forwarded verbatim.
    async fn init_db(&self, db: &Database, options: &serde_json::Value)
        -> anyhow::Result<DbKey>;

    /// Produce the wrapping key for an existing database.
    async fn open_db(&self, db: &Database) -> anyhow::Result<DbKey>;
}
