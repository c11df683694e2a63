//! HTTP-facing error type
//!
//! Every request-scoped failure ends up here and is rendered as
//! `{"error": "<message>"}` with the mapped status. Messages are generic:
//! verification failures never say whether a credential was tampered with,
//! expired or aimed at another audience, and identity-provider errors never
//! echo what the provider returned.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Request-scoped API errors.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// No credential presented at all
    #[error("Forbidden")]
    Forbidden,

    /// Credential presented but not valid for any reason
    #[error("Unauthorized")]
    Unauthorized,

    /// Valid credential for a deactivated account. Rendered exactly like
    /// `Unauthorized` so the response does not reveal account state.
    #[error("Unauthorized")]
    InactiveAccount,

    #[error("Invalid email or password")]
    UpstreamRejected,

    #[error("Identity provider unavailable")]
    UpstreamUnavailable,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unauthorized | Self::InactiveAccount | Self::UpstreamRejected => {
                StatusCode::UNAUTHORIZED
            }
            Self::UpstreamUnavailable | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<wcp_auth::Error> for ApiError {
    fn from(err: wcp_auth::Error) -> Self {
        use wcp_auth::Error as E;
        match err {
            E::MalformedRequest(msg) => Self::MalformedRequest(msg),
            E::Decoding(_) | E::Expired | E::Unauthorized => Self::Unauthorized,
            E::ExchangeRejected(_) => Self::UpstreamRejected,
            E::Exchange(_) | E::Http(_) => Self::UpstreamUnavailable,
            E::Encoding(_) | E::InvalidExpiry(_) => Self::Internal,
        }
    }
}
