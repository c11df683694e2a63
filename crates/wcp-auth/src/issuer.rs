//! Credential issuance
//!
//! Refresh credentials are minted from login input and encrypted. Access
//! credentials wrap an already-verified refresh credential and a capability
//! token from the identity provider, and are only signed: the raw login
//! secret never reaches them, only the encrypted refresh credential does.

use std::time::Duration;

use tracing::debug;

use crate::claims::{AccessPayload, LoginInput, RefreshPayload};
use crate::codec;
use crate::error::{Error, Result};
use crate::key::SecretKey;

/// Encrypt a refresh credential for `login`, valid for `expiry`.
///
/// Requires non-blank email, password and device ID. No identity-provider
/// call happens here; the caller validates the login separately.
pub fn issue_refresh_credential(
    login: &LoginInput,
    key: &SecretKey,
    expiry: Duration,
) -> Result<String> {
    let payload = refresh_payload(login)?;
    let token = codec::encode(&payload, key, expiry)?;
    debug!(device_id = %payload.device_id, "issued refresh credential");
    Ok(token)
}

/// Sign an access credential embedding `refresh_credential` by reference.
///
/// The caller must already have verified `refresh_credential` and obtained
/// `capability_token` from the identity exchange.
pub fn issue_access_credential(
    refresh_credential: &str,
    capability_token: &str,
    key: &SecretKey,
    expiry: Duration,
) -> Result<String> {
    if refresh_credential.is_empty() {
        return Err(Error::MalformedRequest(
            "refresh credential is required".into(),
        ));
    }
    if capability_token.is_empty() {
        return Err(Error::MalformedRequest("capability token is required".into()));
    }

    let payload = AccessPayload {
        external_capability_token: capability_token.to_string(),
        refresh_credential_reference: refresh_credential.to_string(),
    };
    let token = codec::sign(&payload, key, expiry)?;
    debug!("issued access credential");
    Ok(token)
}

fn refresh_payload(login: &LoginInput) -> Result<RefreshPayload> {
    login.validate()?;

    Ok(RefreshPayload {
        email: login.email.clone(),
        password: login.password.clone(),
        device_id: login.device_id.clone(),
        device_address: login.device_address.clone(),
        extensions: login.extensions.clone(),
    })
}
