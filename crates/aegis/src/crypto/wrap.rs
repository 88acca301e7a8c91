//! RFC 3394 AES key wrap of per-value keys under a database key.

use aegis_common::{DbKey, Error};
use aes_kw::KekAes256;
use zeroize::Zeroizing;

use super::VALUE_KEY_LEN;

/// Size of a wrapped per-value key: 32 + 8 bytes of integrity expansion.
pub const WRAPPED_KEY_LEN: usize = VALUE_KEY_LEN + 8;

/// Wrap a per-value key under the database key.
///
/// # Errors
///
/// Returns [`Error::Internal`] if the wrap primitive rejects its input;
/// unreachable for correctly sized keys.
pub fn wrap_key(db_key: &DbKey, value_key: &[u8; VALUE_KEY_LEN]) -> Result<[u8; WRAPPED_KEY_LEN], Error> {
    let kek = KekAes256::from(*db_key.as_bytes());
    let mut wrapped = [0u8; WRAPPED_KEY_LEN];
    kek.wrap(value_key, &mut wrapped)
        .map_err(|e| Error::Internal(format!("key wrap failed: {e}")))?;
    Ok(wrapped)
}

/// Unwrap a per-value key under the database key.
///
/// # Errors
///
/// Returns [`Error::DecryptionFailed`] if the integrity check fails — the
/// wrapped blob was produced under a different key or has been altered.
pub fn unwrap_key(
    db_key: &DbKey,
    wrapped: &[u8; WRAPPED_KEY_LEN],
) -> Result<Zeroizing<[u8; VALUE_KEY_LEN]>, Error> {
    let kek = KekAes256::from(*db_key.as_bytes());
    let mut value_key = Zeroizing::new([0u8; VALUE_KEY_LEN]);
    kek.unwrap(wrapped, value_key.as_mut())
        .map_err(|_| Error::DecryptionFailed)?;
    Ok(value_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_value_key;

    fn test_db_key(byte: u8) -> DbKey {
        DbKey::from([byte; 32])
    }

    #[test]
    fn wrap_unwrap_round_trip() {
        let db_key = test_db_key(0x11);
        let value_key = generate_value_key();
        let wrapped = wrap_key(&db_key, &value_key).unwrap();
        let unwrapped = unwrap_key(&db_key, &wrapped).unwrap();
        assert_eq!(unwrapped.as_slice(), value_key.as_slice());
    }

    #[test]
    fn wrapped_key_has_integrity_expansion() {
        let wrapped = wrap_key(&test_db_key(0x22), &[0u8; VALUE_KEY_LEN]).unwrap();
        assert_eq!(wrapped.len(), VALUE_KEY_LEN + 8);
    }

    #[test]
    fn unwrap_with_wrong_kek_fails() {
        let value_key = generate_value_key();
        let wrapped = wrap_key(&test_db_key(0x33), &value_key).unwrap();
        assert!(matches!(
            unwrap_key(&test_db_key(0x44), &wrapped),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn unwrap_tampered_blob_fails() {
        let db_key = test_db_key(0x55);
        let value_key = generate_value_key();
        let mut wrapped = wrap_key(&db_key, &value_key).unwrap();
        wrapped[0] ^= 0xFF;
        assert!(matches!(
            unwrap_key(&db_key, &wrapped),
            Err(Error::DecryptionFailed)
        ));
    }
}
