//! WCP credential library
//!
//! Two-tier bearer credentials for the WCP API. This crate has no dependency
//! on the HTTP service and can be tested on its own.
//!
//! Credential flow:
//! 1. Login input is checked against the identity provider (`exchange`)
//! 2. `issuer::issue_refresh_credential()` encrypts the login into a
//!    long-lived refresh credential
//! 3. On refresh, `verifier::verify_refresh_credential()` opens it, the login
//!    is replayed to the identity provider for a capability token, and
//!    `issuer::issue_access_credential()` signs a short-lived access
//!    credential referencing the refresh credential
//! 4. Every gated request runs `verifier::resolve_identity()` on the access
//!    credential, which re-verifies the nested refresh credential

pub mod claims;
pub mod codec;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod expiry;
pub mod issuer;
pub mod key;
pub mod verifier;

pub use claims::{
    ACTIVE_CLAIM, AccessPayload, Claims, Extensions, LoginInput, RefreshPayload,
    ResolvedIdentity, unix_millis,
};
pub use constants::*;
pub use error::{Error, Result};
pub use exchange::{CapabilityGrant, HttpIdentityExchange, IdentityExchange};
pub use expiry::parse_expiry;
pub use issuer::{issue_access_credential, issue_refresh_credential};
pub use key::SecretKey;
pub use verifier::{resolve_identity, verify_access_credential, verify_refresh_credential};
