//! Framed ciphertext envelope codec.
//!
//! # Wire format
//!
//! ```text
//! version(1) | wrapped_key(40) | tag(16) | ciphertext(..)
//! ```
//!
//! All fields are concatenated big-endian-style with no separators; the
//! ciphertext is the same length as the plaintext. The version byte enables
//! future algorithm migration without breaking existing ciphertext.

use aegis_common::Error;

use crate::crypto::{TAG_LEN, WRAPPED_KEY_LEN};

/// The only envelope version this codec produces or accepts.
pub const VERSION: u8 = 0x01;

/// Fixed size of the envelope header preceding the ciphertext body.
pub const HEADER_LEN: usize = 1 + WRAPPED_KEY_LEN + TAG_LEN;

/// A parsed ciphertext envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// AES-wrapped per-value key.
    pub wrapped_key: [u8; WRAPPED_KEY_LEN],
    /// AES-GCM authentication tag.
    pub tag: [u8; TAG_LEN],
    /// AES-GCM ciphertext, same length as the plaintext.
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encode this envelope into its wire representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        buf.push(VERSION);
        buf.extend_from_slice(&self.wrapped_key);
        buf.extend_from_slice(&self.tag);
        buf.extend_from_slice(&self.ciphertext);
        buf
    }

    /// Parse a wire buffer back into an [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCiphertext`] if the buffer is shorter than
    /// [`HEADER_LEN`] or does not start with [`VERSION`].
    pub fn parse(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_LEN || buf[0] != VERSION {
            return Err(Error::NotCiphertext);
        }
        let mut wrapped_key = [0u8; WRAPPED_KEY_LEN];
        wrapped_key.copy_from_slice(&buf[1..1 + WRAPPED_KEY_LEN]);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&buf[1 + WRAPPED_KEY_LEN..HEADER_LEN]);
        Ok(Self {
            wrapped_key,
            tag,
            ciphertext: buf[HEADER_LEN..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope {
            wrapped_key: [0xAA; WRAPPED_KEY_LEN],
            tag: [0xBB; TAG_LEN],
            ciphertext: vec![0xCC; 5],
        }
    }

    #[test]
    fn header_is_57_bytes() {
        assert_eq!(HEADER_LEN, 57);
    }

    #[test]
    fn encode_parse_round_trip() {
        let env = sample();
        let bytes = env.to_bytes();
        assert_eq!(bytes.len(), 62);
        assert_eq!(bytes[0], 0x01);
        assert_eq!(Envelope::parse(&bytes).unwrap(), env);
    }

    #[test]
    fn layout_matches_field_order() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[1..41], &[0xAA; 40]);
        assert_eq!(&bytes[41..57], &[0xBB; 16]);
        assert_eq!(&bytes[57..], &[0xCC; 5]);
    }

    #[test]
    fn short_buffer_is_not_ciphertext() {
        assert!(matches!(
            Envelope::parse(&[0x01; 10]),
            Err(Error::NotCiphertext)
        ));
        // One byte short of a valid empty-body envelope.
        let mut buf = sample().to_bytes();
        buf.truncate(HEADER_LEN - 1);
        assert!(matches!(Envelope::parse(&buf), Err(Error::NotCiphertext)));
    }

    #[test]
    fn unknown_version_is_not_ciphertext() {
        let mut bytes = sample().to_bytes();
        bytes[0] = 0x02;
        assert!(matches!(Envelope::parse(&bytes), Err(Error::NotCiphertext)));
    }

    #[test]
    fn empty_body_envelope_is_valid() {
        let env = Envelope {
            wrapped_key: [0; WRAPPED_KEY_LEN],
            tag: [0; TAG_LEN],
            ciphertext: Vec::new(),
        };
        let bytes = env.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(Envelope::parse(&bytes).unwrap(), env);
    }
}
