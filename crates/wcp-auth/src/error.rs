//! Error types for credential operations

/// Errors from credential issuance, verification and identity exchange.
///
/// `Decoding` and `Expired` stay distinct inside the library so callers can
/// log the concrete reason. `resolve_identity` collapses every failure into
/// `Unauthorized` before anything reaches the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("decoding failed: {0}")]
    Decoding(String),

    #[error("credential expired")]
    Expired,

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("identity provider rejected credentials: {0}")]
    ExchangeRejected(String),

    #[error("identity exchange failed: {0}")]
    Exchange(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("invalid expiry: {0}")]
    InvalidExpiry(String),
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
