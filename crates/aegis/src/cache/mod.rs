//! In-memory database key cache.
//!
//! # Module invariants
//!
//! - **Single writer.** Only the service coordinator mutates the cache; the
//!   freshness index is the one projection shared with reader threads.
//! - **No crypto dependencies.** This module must not import anything from
//!   `crate::crypto` or `crate::keymgr`.

pub mod store;

pub use store::{FreshnessIndex, KeyCache, Lookup, LAST_ACCESSED_INACTIVITY_SEC};
