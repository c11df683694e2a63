//! Process-wide symmetric key material
//!
//! One key serves both tiers: it is the ChaCha20-Poly1305 key for refresh
//! credentials and the HMAC-SHA256 secret for access credentials. It is parsed
//! once at startup and handed by reference to every encode/verify call.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use common::Secret;

use crate::constants::KEY_LEN;
use crate::error::{Error, Result};

/// Symmetric key bytes, exactly [`KEY_LEN`] long. Redacted in Debug output.
#[derive(Clone)]
pub struct SecretKey(Secret<Vec<u8>>);

impl SecretKey {
    /// Parse key material from its textual form.
    ///
    /// Accepted encodings, tried in order: 64 hex digits, base64url without
    /// padding, base64url with padding, standard base64. The decoded value
    /// must be exactly 32 bytes.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::Encoding("key material is absent".into()));
        }

        let decoded = if trimmed.len() == KEY_LEN * 2 && trimmed.chars().all(|c| c.is_ascii_hexdigit())
        {
            decode_hex(trimmed)
        } else {
            URL_SAFE_NO_PAD
                .decode(trimmed)
                .or_else(|_| URL_SAFE.decode(trimmed))
                .or_else(|_| STANDARD.decode(trimmed))
                .ok()
        };

        let bytes =
            decoded.ok_or_else(|| Error::Encoding("key material is not valid hex or base64".into()))?;
        Self::from_bytes(bytes)
    }

    /// Wrap raw key bytes. Fails unless exactly [`KEY_LEN`] bytes are given.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(Error::Encoding(format!(
                "key material must be {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(Secret::new(bytes)))
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        self.0.expose()
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretKey").field(&self.0).finish()
    }
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    input
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some(((hi << 4) | lo) as u8)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base64url_without_padding() {
        let encoded = URL_SAFE_NO_PAD.encode([7u8; 32]);
        let key = SecretKey::parse(&encoded).unwrap();
        assert_eq!(key.bytes(), &[7u8; 32]);
    }

    #[test]
    fn parses_standard_base64() {
        let encoded = STANDARD.encode([0xfbu8; 32]);
        assert!(encoded.contains('+') || encoded.contains('/'));
        let key = SecretKey::parse(&encoded).unwrap();
        assert_eq!(key.bytes(), &[0xfbu8; 32]);
    }

    #[test]
    fn parses_hex() {
        let hex = "00".repeat(31) + "ff";
        let key = SecretKey::parse(&hex).unwrap();
        assert_eq!(key.bytes()[31], 0xff);
        assert_eq!(key.bytes()[0], 0x00);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let encoded = format!("  {}\n", URL_SAFE_NO_PAD.encode([1u8; 32]));
        assert!(SecretKey::parse(&encoded).is_ok());
    }

    #[test]
    fn rejects_absent_material() {
        let err = SecretKey::parse("   ").unwrap_err();
        assert!(matches!(err, Error::Encoding(_)), "got: {err:?}");
    }

    #[test]
    fn rejects_wrong_length() {
        let encoded = URL_SAFE_NO_PAD.encode([1u8; 16]);
        let err = SecretKey::parse(&encoded).unwrap_err();
        assert!(err.to_string().contains("32 bytes"), "got: {err}");
    }

    #[test]
    fn rejects_garbage() {
        assert!(SecretKey::parse("not*a*key!").is_err());
    }

    #[test]
    fn debug_is_redacted() {
        let key = SecretKey::from_bytes(vec![42u8; 32]).unwrap();
        let debug = format!("{key:?}");
        assert_eq!(debug, "SecretKey([REDACTED])");
    }
}
