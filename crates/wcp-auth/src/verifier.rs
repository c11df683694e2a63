//! Credential verification
//!
//! Every call walks the same path and stops at the first failure:
//!
//! ```text
//! Received -> StructurallyValid -> SignatureValid -> NotExpired
//!          -> (access only) NestedReferenceValid -> Resolved
//! ```
//!
//! The single-tier functions keep the concrete failure (`Decoding` or
//! `Expired`) for logging. `resolve_identity` is what the gate calls, and it
//! only ever fails with `Unauthorized`.

use tracing::debug;

use crate::claims::{AccessPayload, Claims, RefreshPayload, ResolvedIdentity};
use crate::codec;
use crate::error::{Error, Result};
use crate::key::SecretKey;

/// Verify an access credential's signature, issuer, audience and expiry.
pub fn verify_access_credential(
    token: &str,
    key: &SecretKey,
    now_ms: u64,
) -> Result<Claims<AccessPayload>> {
    let claims: Claims<AccessPayload> = codec::verify_signature(token, key)?;
    reject_expired(claims, now_ms)
}

/// Decrypt a refresh credential and check issuer, audience and expiry.
pub fn verify_refresh_credential(
    token: &str,
    key: &SecretKey,
    now_ms: u64,
) -> Result<Claims<RefreshPayload>> {
    let claims: Claims<RefreshPayload> = codec::decode(token, key)?;
    reject_expired(claims, now_ms)
}

/// Fully verify an access credential and its embedded refresh credential.
///
/// Failure at any step yields [`Error::Unauthorized`]; the concrete reason
/// is logged at debug level and never returned.
pub fn resolve_identity(token: &str, key: &SecretKey, now_ms: u64) -> Result<ResolvedIdentity> {
    let access = verify_access_credential(token, key, now_ms).map_err(|e| {
        debug!(error = %e, stage = "access", "credential rejected");
        Error::Unauthorized
    })?;

    let refresh = verify_refresh_credential(
        &access.payload.refresh_credential_reference,
        key,
        now_ms,
    )
    .map_err(|e| {
        debug!(error = %e, stage = "refresh_reference", "credential rejected");
        Error::Unauthorized
    })?;

    Ok(ResolvedIdentity::merge(refresh, access.payload))
}

fn reject_expired<T>(claims: Claims<T>, now_ms: u64) -> Result<Claims<T>> {
    if claims.is_expired_at(now_ms) {
        return Err(Error::Expired);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::claims::{Extensions, LoginInput};
    use crate::issuer::{issue_access_credential, issue_refresh_credential};

    const NOW_MS: u64 = 1_750_000_000_000;

    fn key() -> SecretKey {
        SecretKey::from_bytes(vec![21u8; 32]).unwrap()
    }

    fn refresh_payload() -> RefreshPayload {
        let mut extensions = Extensions::new();
        extensions.insert("is_active".into(), serde_json::json!(true));
        RefreshPayload {
            email: "user@example.com".into(),
            password: "hunter2".into(),
            device_id: "sis-001".into(),
            device_address: "aa:bb:cc:dd:ee:ff".into(),
            extensions,
        }
    }

    fn access_payload(reference: &str) -> AccessPayload {
        AccessPayload {
            external_capability_token: "cap-xyz".into(),
            refresh_credential_reference: reference.into(),
        }
    }

    fn refresh_token(issued_at_ms: u64, expiry: Duration) -> String {
        codec::encode_at(&refresh_payload(), &key(), issued_at_ms, expiry).unwrap()
    }

    fn access_token(reference: &str, issued_at_ms: u64, expiry: Duration) -> String {
        codec::sign_at(&access_payload(reference), &key(), issued_at_ms, expiry).unwrap()
    }

    #[test]
    fn refresh_expiry_boundary() {
        let token = refresh_token(NOW_MS, Duration::from_secs(60));
        let expires_at_ms = (NOW_MS / 1000 + 60) * 1000;

        assert!(verify_refresh_credential(&token, &key(), expires_at_ms - 1).is_ok());
        assert!(verify_refresh_credential(&token, &key(), expires_at_ms).is_ok());
        let err = verify_refresh_credential(&token, &key(), expires_at_ms + 1).unwrap_err();
        assert!(matches!(err, Error::Expired), "got: {err:?}");
    }

    #[test]
    fn access_expiry_boundary() {
        let token = access_token("ref", NOW_MS, Duration::from_secs(3600));
        let expires_at_ms = (NOW_MS / 1000 + 3600) * 1000;

        assert!(verify_access_credential(&token, &key(), expires_at_ms - 1).is_ok());
        let err = verify_access_credential(&token, &key(), expires_at_ms + 1).unwrap_err();
        assert!(matches!(err, Error::Expired), "got: {err:?}");
    }

    #[test]
    fn tampered_credentials_surface_as_decoding_errors() {
        let err = verify_refresh_credential("garbage", &key(), NOW_MS).unwrap_err();
        assert!(matches!(err, Error::Decoding(_)), "got: {err:?}");
        let err = verify_access_credential("garbage", &key(), NOW_MS).unwrap_err();
        assert!(matches!(err, Error::Decoding(_)), "got: {err:?}");
    }

    #[test]
    fn resolves_nested_identity() {
        let refresh = refresh_token(NOW_MS, Duration::from_secs(86400));
        let access = access_token(&refresh, NOW_MS, Duration::from_secs(3600));

        let identity = resolve_identity(&access, &key(), NOW_MS + 1).unwrap();
        assert_eq!(identity.email, "user@example.com");
        assert_eq!(identity.password.expose(), "hunter2");
        assert_eq!(identity.device_id, "sis-001");
        assert_eq!(identity.device_address, "aa:bb:cc:dd:ee:ff");
        assert_eq!(identity.external_capability_token.expose(), "cap-xyz");
        assert_eq!(identity.extensions, refresh_payload().extensions);
        assert_eq!(identity.expires_at, NOW_MS / 1000 + 86400);
    }

    #[test]
    fn resolves_credentials_from_the_issuer() {
        let login = LoginInput {
            email: "someone@example.com".into(),
            password: "pw".into(),
            device_id: "dev-9".into(),
            device_address: String::new(),
            extensions: Extensions::new(),
        };
        let refresh = issue_refresh_credential(&login, &key(), Duration::from_secs(600)).unwrap();
        let access =
            issue_access_credential(&refresh, "cap-live", &key(), Duration::from_secs(60)).unwrap();

        let identity = resolve_identity(&access, &key(), crate::claims::unix_millis()).unwrap();
        assert_eq!(identity.email, "someone@example.com");
        assert_eq!(identity.external_capability_token.expose(), "cap-live");
        assert_eq!(identity.account_active(), None);
    }

    #[test]
    fn expired_nested_reference_is_unauthorized() {
        let refresh = refresh_token(NOW_MS - 120_000, Duration::from_secs(60));
        let access = access_token(&refresh, NOW_MS, Duration::from_secs(3600));

        let err = resolve_identity(&access, &key(), NOW_MS).unwrap_err();
        assert!(matches!(err, Error::Unauthorized), "got: {err:?}");
    }

    #[test]
    fn unverifiable_nested_reference_is_unauthorized() {
        let access = access_token("not-an-encrypted-token", NOW_MS, Duration::from_secs(3600));
        let err = resolve_identity(&access, &key(), NOW_MS).unwrap_err();
        assert!(matches!(err, Error::Unauthorized), "got: {err:?}");

        // A reference encrypted under another key is just as dead.
        let foreign_key = SecretKey::from_bytes(vec![99u8; 32]).unwrap();
        let foreign =
            codec::encode_at(&refresh_payload(), &foreign_key, NOW_MS, Duration::from_secs(60))
                .unwrap();
        let access = access_token(&foreign, NOW_MS, Duration::from_secs(3600));
        assert!(matches!(
            resolve_identity(&access, &key(), NOW_MS),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn refresh_credential_is_not_an_access_credential() {
        let refresh = refresh_token(NOW_MS, Duration::from_secs(60));
        let err = resolve_identity(&refresh, &key(), NOW_MS).unwrap_err();
        assert!(matches!(err, Error::Unauthorized), "got: {err:?}");
    }

    #[test]
    fn expired_access_credential_is_unauthorized() {
        let refresh = refresh_token(NOW_MS, Duration::from_secs(86400));
        let access = access_token(&refresh, NOW_MS - 7_200_000, Duration::from_secs(3600));
        assert!(matches!(
            resolve_identity(&access, &key(), NOW_MS),
            Err(Error::Unauthorized)
        ));
    }
}
