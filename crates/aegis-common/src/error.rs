//! Common error types shared across crates.

use thiserror::Error;

/// Top-level key service error type.
///
/// Variants map to the stable codes returned by [`Error::code`]:
/// - [`Error::KeyManagerUnavailable`] → `key_manager_unavailable`
/// - [`Error::NotCiphertext`] → `not_ciphertext`
/// - [`Error::DecryptionFailed`] → `decryption_failed`
/// - [`Error::Internal`] → `internal_error`
#[derive(Debug, Error)]
pub enum Error {
    /// The external key manager failed to produce a database key.
    #[error("key manager unavailable: {0}")]
    KeyManagerUnavailable(String),

    /// The supplied buffer is not a ciphertext envelope — too short, or an
    /// unsupported version byte.
    #[error("not ciphertext")]
    NotCiphertext,

    /// Key unwrap or payload authentication failed.
    ///
    /// Carries no detail: callers must not be able to tell a wrap integrity
    /// failure from an AEAD tag mismatch.
    #[error("decryption failed")]
    DecryptionFailed,

    /// An internal invariant was violated (index divergence, counter reuse).
    /// The coordinator treats this as fatal.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::KeyManagerUnavailable(_) => "key_manager_unavailable",
            Error::NotCiphertext => "not_ciphertext",
            Error::DecryptionFailed => "decryption_failed",
            Error::Internal(_) => "internal_error",
        }
    }
}
