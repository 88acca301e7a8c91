//! Common types and errors shared across `aegis` crates.

pub mod error;
pub mod types;

pub use error::Error;
pub use types::{Database, DbKey, DB_KEY_LEN};
