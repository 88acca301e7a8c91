//! `aegis` — per-database encryption key service.
//!
//! Mediates data encryption for a document database: every database
//! (identified by uuid) gets a wrapping key from a pluggable [`KeyManager`],
//! and every stored value is encrypted under a fresh per-value key that is
//! wrapped under the database key and framed into a versioned envelope bound
//! to `(database uuid, logical key)`.
//!
//! Service lifecycle:
//! 1. The embedding process builds a [`KeyManager`] provider.
//! 2. [`KeyService::start`] spawns the coordinator task that owns the key
//!    cache and begins periodic expiry sweeps.
//! 3. Callers clone the [`KeyService`] handle freely; `encrypt`/`decrypt`
//!    consult the lock-free freshness index and only reach the key manager
//!    on a miss or stale entry.
//! 4. Dropping the last handle stops the coordinator; cached key material
//!    is zeroized. Nothing is persisted — the cache rebuilds on demand.
//!
//! Tunables live under the `aegis` configuration namespace; see
//! [`config::Settings`].

pub mod cache;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod keymgr;
pub mod service;

pub use aegis_common::{Database, DbKey, Error};
pub use config::Settings;
pub use envelope::Envelope;
pub use keymgr::{EphemeralKeyManager, KeyManager};
pub use service::KeyService;
