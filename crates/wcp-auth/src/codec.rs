//! Token codec for both credential tiers
//!
//! - Encrypted tokens (refresh tier): `header.nonce.ciphertext`, each segment
//!   base64url without padding. ChaCha20-Poly1305 under the process key with
//!   a random 96-bit nonce; the encoded header segment is bound as associated
//!   data so it cannot be swapped.
//! - Signed tokens (access tier): standard HS256 JWT.
//!
//! Decoding checks integrity, structure, issuer and audience. It never checks
//! expiry; that belongs to the verifier, which knows the current time.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::claims::{Claims, unix_millis};
use crate::constants::{AUDIENCE, ENCRYPTED_HEADER, ISSUER};
use crate::error::{Error, Result};
use crate::key::SecretKey;

const NONCE_LEN: usize = 12;

/// Encrypt `payload` into a token issued now and valid for `expiry`.
pub fn encode<T: Serialize>(payload: &T, key: &SecretKey, expiry: Duration) -> Result<String> {
    encode_at(payload, key, unix_millis(), expiry)
}

/// Encrypt `payload` into a token issued at `issued_at_ms`.
pub fn encode_at<T: Serialize>(
    payload: &T,
    key: &SecretKey,
    issued_at_ms: u64,
    expiry: Duration,
) -> Result<String> {
    encode_claims(&envelope(payload, issued_at_ms, expiry), key)
}

pub(crate) fn encode_claims<T: Serialize>(claims: &Claims<T>, key: &SecretKey) -> Result<String> {
    let plaintext = serde_json::to_vec(claims)
        .map_err(|e| Error::Encoding(format!("serializing claims: {e}")))?;
    let cipher = ChaCha20Poly1305::new_from_slice(key.bytes())
        .map_err(|_| Error::Encoding("key material has invalid length".into()))?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill(&mut nonce);

    let header = URL_SAFE_NO_PAD.encode(ENCRYPTED_HEADER);
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &plaintext,
                aad: header.as_bytes(),
            },
        )
        .map_err(|_| Error::Encoding("encryption failed".into()))?;

    Ok(format!(
        "{header}.{}.{}",
        URL_SAFE_NO_PAD.encode(nonce),
        URL_SAFE_NO_PAD.encode(ciphertext)
    ))
}

/// Decrypt an encrypted token and check issuer and audience.
pub fn decode<T: DeserializeOwned>(token: &str, key: &SecretKey) -> Result<Claims<T>> {
    let mut segments = token.split('.');
    let (Some(header), Some(nonce), Some(ciphertext), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(Error::Decoding(
            "expected three dot-separated segments".into(),
        ));
    };

    let header_bytes = segment(header, "header")?;
    if header_bytes != ENCRYPTED_HEADER.as_bytes() {
        return Err(Error::Decoding("unsupported protected header".into()));
    }

    let nonce = segment(nonce, "nonce")?;
    if nonce.len() != NONCE_LEN {
        return Err(Error::Decoding(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        )));
    }
    let ciphertext = segment(ciphertext, "ciphertext")?;

    let cipher = ChaCha20Poly1305::new_from_slice(key.bytes())
        .map_err(|_| Error::Decoding("key material has invalid length".into()))?;
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &ciphertext,
                aad: header.as_bytes(),
            },
        )
        .map_err(|_| Error::Decoding("authentication tag mismatch".into()))?;

    let claims: Claims<T> = serde_json::from_slice(&plaintext)
        .map_err(|e| Error::Decoding(format!("parsing claims: {e}")))?;
    check_issuer_and_audience(&claims)?;
    Ok(claims)
}

/// Sign `payload` into an HS256 JWT issued now and valid for `expiry`.
pub fn sign<T: Serialize>(payload: &T, key: &SecretKey, expiry: Duration) -> Result<String> {
    sign_at(payload, key, unix_millis(), expiry)
}

/// Sign `payload` into an HS256 JWT issued at `issued_at_ms`.
pub fn sign_at<T: Serialize>(
    payload: &T,
    key: &SecretKey,
    issued_at_ms: u64,
    expiry: Duration,
) -> Result<String> {
    sign_claims(&envelope(payload, issued_at_ms, expiry), key)
}

pub(crate) fn sign_claims<T: Serialize>(claims: &Claims<T>, key: &SecretKey) -> Result<String> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(key.bytes()),
    )
    .map_err(|e| Error::Encoding(format!("signing claims: {e}")))
}

/// Verify an HS256 JWT's signature, issuer and audience. Expiry is not checked.
pub fn verify_signature<T: DeserializeOwned>(token: &str, key: &SecretKey) -> Result<Claims<T>> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.set_required_spec_claims(&["exp", "iat", "iss", "aud"]);
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&[AUDIENCE]);

    let data = jsonwebtoken::decode::<Claims<T>>(
        token,
        &DecodingKey::from_secret(key.bytes()),
        &validation,
    )
    .map_err(|e| Error::Decoding(format!("verifying signature: {e}")))?;

    // jsonwebtoken accepts an audience array containing "wcp"; a bare string is required here.
    check_issuer_and_audience(&data.claims)?;
    Ok(data.claims)
}

fn envelope<T>(payload: T, issued_at_ms: u64, expiry: Duration) -> Claims<T> {
    let iat = issued_at_ms / 1000;
    Claims {
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
        iat,
        exp: iat.saturating_add(expiry.as_secs()),
        payload,
    }
}

fn segment(encoded: &str, name: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| Error::Decoding(format!("{name} segment is not base64url: {e}")))
}

fn check_issuer_and_audience<T>(claims: &Claims<T>) -> Result<()> {
    if claims.iss != ISSUER {
        return Err(Error::Decoding(format!(
            "unexpected issuer '{}'",
            claims.iss
        )));
    }
    if claims.aud != AUDIENCE {
        return Err(Error::Decoding(format!(
            "unexpected audience '{}'",
            claims.aud
        )));
    }
    Ok(())
}
