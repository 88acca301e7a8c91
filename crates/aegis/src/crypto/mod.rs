//! Cryptographic primitives for value encryption.
//!
//! This module is intentionally free of cache and key manager dependencies.
//! It provides the two low-level operations the service composes:
//!
//! - RFC 3394 AES key wrap of a fresh per-value key under the database key
//!   ([`wrap`]).
//! - AES-256-GCM authenticated encryption of the payload under the per-value
//!   key, bound to `(uuid, logical_key)` via associated data ([`cipher`]).

pub mod cipher;
pub mod wrap;

pub use cipher::{binding_aad, decrypt_value, encrypt_value, generate_value_key};
pub use wrap::{unwrap_key, wrap_key, WRAPPED_KEY_LEN};

/// Byte length of a per-value encryption key (32 bytes = 256 bits).
pub const VALUE_KEY_LEN: usize = 32;

/// Byte length of the AES-GCM IV (12 bytes = 96 bits).
pub const IV_LEN: usize = 12;

/// Byte length of the AES-GCM authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;
