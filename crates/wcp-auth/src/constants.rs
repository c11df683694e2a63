//! Credential constants
//!
//! Issuer and audience are fixed for every credential this service mints.
//! A credential carrying any other value is rejected even when its tag or
//! signature checks out.

/// `iss` claim on every credential
pub const ISSUER: &str = "wcp";

/// `aud` claim on every credential
pub const AUDIENCE: &str = "wcp";

/// Protected header of encrypted tokens: direct key agreement, ChaCha20-Poly1305.
pub const ENCRYPTED_HEADER: &str = r#"{"alg":"dir","enc":"C20P"}"#;

/// Default refresh credential lifetime
pub const DEFAULT_REFRESH_EXPIRY: &str = "10y";

/// Default access credential lifetime
pub const DEFAULT_ACCESS_EXPIRY: &str = "1h";

/// Length in bytes of the process-wide symmetric key.
pub const KEY_LEN: usize = 32;
