//! AES-256-GCM encryption of value payloads under a per-value key.
//!
//! The IV is fixed to all zeros. That is sound here for one reason only:
//! every payload is encrypted under a per-value key drawn fresh from the OS
//! CSPRNG, so no (key, IV) pair ever recurs. A value key must never encrypt
//! a second payload.
//!
//! The associated data binds the ciphertext to the database identity and the
//! logical key: `uuid || 0x00 || logical_key`. Decrypting with either
//! component changed fails authentication.

use aegis_common::Error;
use aes_gcm::{
    aead::{rand_core::RngCore, AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce, Tag,
};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::{IV_LEN, TAG_LEN, VALUE_KEY_LEN};

const ZERO_IV: [u8; IV_LEN] = [0u8; IV_LEN];

/// Generate a fresh random 256-bit per-value key.
pub fn generate_value_key() -> Zeroizing<[u8; VALUE_KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; VALUE_KEY_LEN]);
    OsRng.fill_bytes(key.as_mut());
    key
}

/// Build the associated data binding a ciphertext to its identity.
pub fn binding_aad(uuid: &Uuid, logical_key: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(16 + 1 + logical_key.len());
    aad.extend_from_slice(uuid.as_bytes());
    aad.push(0x00);
    aad.extend_from_slice(logical_key);
    aad
}

/// Encrypt `plaintext` under `value_key`, returning the ciphertext and the
/// detached 128-bit tag.
///
/// # Errors
///
/// Returns [`Error::Internal`] on an AEAD-layer failure; unreachable with a
/// correctly sized key.
pub fn encrypt_value(
    value_key: &[u8; VALUE_KEY_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN]), Error> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(value_key));
    let mut buf = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&ZERO_IV), aad, &mut buf)
        .map_err(|_| Error::Internal("aead encryption failed".into()))?;
    Ok((buf, tag.into()))
}

/// Decrypt `ciphertext` under `value_key`, authenticating `aad` and `tag`.
///
/// # Errors
///
/// Returns [`Error::DecryptionFailed`] on tag mismatch — wrong key, altered
/// ciphertext, or mismatched associated data.
pub fn decrypt_value(
    value_key: &[u8; VALUE_KEY_LEN],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
) -> Result<Vec<u8>, Error> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(value_key));
    let mut buf = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&ZERO_IV),
            aad,
            &mut buf,
            Tag::from_slice(tag),
        )
        .map_err(|_| Error::DecryptionFailed)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn value_keys_are_unique() {
        let k1 = generate_value_key();
        let k2 = generate_value_key();
        assert_ne!(k1.as_slice(), k2.as_slice());
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = generate_value_key();
        let aad = binding_aad(&Uuid::new_v4(), b"name");
        let (ct, tag) = encrypt_value(&key, &aad, b"hello").unwrap();
        assert_eq!(ct.len(), 5);
        let pt = decrypt_value(&key, &aad, &ct, &tag).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn empty_plaintext_round_trip() {
        let key = generate_value_key();
        let aad = binding_aad(&Uuid::new_v4(), b"k");
        let (ct, tag) = encrypt_value(&key, &aad, b"").unwrap();
        assert!(ct.is_empty());
        assert_eq!(decrypt_value(&key, &aad, &ct, &tag).unwrap(), b"");
    }

    #[test]
    fn megabyte_plaintext_round_trip() {
        let key = generate_value_key();
        let aad = binding_aad(&Uuid::new_v4(), b"blob");
        let plaintext: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
        let (ct, tag) = encrypt_value(&key, &aad, &plaintext).unwrap();
        assert_eq!(ct.len(), plaintext.len());
        assert_eq!(decrypt_value(&key, &aad, &ct, &tag).unwrap(), plaintext);
    }

    #[test]
    fn mismatched_uuid_fails_auth() {
        let key = generate_value_key();
        let (ct, tag) =
            encrypt_value(&key, &binding_aad(&Uuid::new_v4(), b"k"), b"payload").unwrap();
        let other = binding_aad(&Uuid::new_v4(), b"k");
        assert!(matches!(
            decrypt_value(&key, &other, &ct, &tag),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn mismatched_logical_key_fails_auth() {
        let key = generate_value_key();
        let uuid = Uuid::new_v4();
        let (ct, tag) = encrypt_value(&key, &binding_aad(&uuid, b"a"), b"payload").unwrap();
        assert!(matches!(
            decrypt_value(&key, &binding_aad(&uuid, b"b"), &ct, &tag),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn flipped_tag_bit_fails_auth() {
        let key = generate_value_key();
        let aad = binding_aad(&Uuid::new_v4(), b"k");
        let (ct, mut tag) = encrypt_value(&key, &aad, b"payload").unwrap();
        tag[0] ^= 0x01;
        assert!(matches!(
            decrypt_value(&key, &aad, &ct, &tag),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn aad_layout_is_uuid_nul_key() {
        let uuid = Uuid::from_bytes([0xAB; 16]);
        let aad = binding_aad(&uuid, b"doc");
        assert_eq!(&aad[..16], &[0xAB; 16]);
        assert_eq!(aad[16], 0x00);
        assert_eq!(&aad[17..], b"doc");
    }

    proptest! {
        #[test]
        fn prop_round_trip(plaintext in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let key = generate_value_key();
            let aad = binding_aad(&Uuid::from_bytes([1; 16]), b"field");
            let (ct, tag) = encrypt_value(&key, &aad, &plaintext).unwrap();
            prop_assert_eq!(ct.len(), plaintext.len());
            let pt = decrypt_value(&key, &aad, &ct, &tag).unwrap();
            prop_assert_eq!(pt, plaintext);
        }

        #[test]
        fn prop_ciphertext_differs_under_fresh_keys(
            plaintext in proptest::collection::vec(any::<u8>(), 1..512)
        ) {
            // Two encryptions of the same payload must differ because the
            // value key is regenerated per call.
            let aad = binding_aad(&Uuid::from_bytes([2; 16]), b"field");
            let (ct1, tag1) = encrypt_value(&generate_value_key(), &aad, &plaintext).unwrap();
            let (ct2, tag2) = encrypt_value(&generate_value_key(), &aad, &plaintext).unwrap();
            prop_assert!(ct1 != ct2 || tag1 != tag2);
        }
    }
}
