//! Credential payloads
//!
//! Both credential tiers share the [`Claims`] envelope (issuer, audience,
//! issued-at, expiry) and flatten their own payload into it, so the wire
//! form is one flat JSON object.
//!
//! Temporal claims are unix seconds, as in JWT. Verification time is unix
//! milliseconds; a credential is expired once `now_ms > exp * 1000`.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Extension claims carried alongside the required fields.
pub type Extensions = BTreeMap<String, serde_json::Value>;

/// Extension key of the account-active flag.
pub const ACTIVE_CLAIM: &str = "is_active";

/// Registered claims wrapped around a tier-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims<T> {
    pub iss: String,
    pub aud: String,
    /// Issued at, unix seconds
    pub iat: u64,
    /// Expires at, unix seconds
    pub exp: u64,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Claims<T> {
    /// Whether the credential is past its expiry at `now_ms`.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms > self.exp.saturating_mul(1000)
    }
}

/// Long-lived refresh credential payload. Travels only inside the encrypted tier.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub email: String,
    /// Raw login secret, replayed to the identity provider on every refresh.
    pub password: String,
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "deviceAddress", default)]
    pub device_address: String,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl RefreshPayload {
    /// Account-active flag recorded at login, if the provider reported one.
    pub fn account_active(&self) -> Option<bool> {
        active_flag(&self.extensions)
    }
}

impl fmt::Debug for RefreshPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshPayload")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("device_id", &self.device_id)
            .field("device_address", &self.device_address)
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// Short-lived access credential payload. Signed, not encrypted.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPayload {
    #[serde(rename = "externalCapabilityToken")]
    pub external_capability_token: String,
    /// The encoded refresh credential, opaque to the holder.
    #[serde(rename = "refreshCredentialReference")]
    pub refresh_credential_reference: String,
}

impl fmt::Debug for AccessPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPayload")
            .field("external_capability_token", &"[REDACTED]")
            .field("refresh_credential_reference", &"[REDACTED]")
            .finish()
    }
}

/// Login input accepted by the issuer.
#[derive(Clone, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "deviceID", default)]
    pub device_id: String,
    #[serde(rename = "deviceAddress", default)]
    pub device_address: String,
    /// Claims added server-side (e.g. the account-active flag), never taken from clients.
    #[serde(skip)]
    pub extensions: Extensions,
}

impl LoginInput {
    /// Reject blank email, password or device ID. Device address may be empty.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("email", &self.email),
            ("password", &self.password),
            ("deviceID", &self.device_id),
        ] {
            if value.trim().is_empty() {
                return Err(Error::MalformedRequest(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for LoginInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginInput")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("device_id", &self.device_id)
            .field("device_address", &self.device_address)
            .finish()
    }
}

/// Verified identity of one caller, valid for the request that resolved it.
///
/// Never serialized into a credential. Secrets stay wrapped so the identity
/// can be logged with `?identity` safely.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub email: String,
    pub password: Secret<String>,
    pub device_id: String,
    pub device_address: String,
    pub external_capability_token: Secret<String>,
    /// Refresh credential issue time, unix seconds
    pub issued_at: u64,
    /// Refresh credential expiry, unix seconds
    pub expires_at: u64,
    pub extensions: Extensions,
}

impl ResolvedIdentity {
    /// Merge a verified refresh payload with the access tier's capability token.
    ///
    /// The capability token takes precedence: a same-named extension claim in
    /// the refresh payload is dropped.
    pub fn merge(refresh: Claims<RefreshPayload>, access: AccessPayload) -> Self {
        let RefreshPayload {
            email,
            password,
            device_id,
            device_address,
            mut extensions,
        } = refresh.payload;
        extensions.remove("externalCapabilityToken");

        Self {
            email,
            password: Secret::new(password),
            device_id,
            device_address,
            external_capability_token: Secret::new(access.external_capability_token),
            issued_at: refresh.iat,
            expires_at: refresh.exp,
            extensions,
        }
    }

    /// Account-active flag, if the refresh credential carried one.
    pub fn account_active(&self) -> Option<bool> {
        active_flag(&self.extensions)
    }
}

fn active_flag(extensions: &Extensions) -> Option<bool> {
    extensions
        .get(ACTIVE_CLAIM)
        .and_then(serde_json::Value::as_bool)
}

/// Current time as unix milliseconds.
pub fn unix_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}
