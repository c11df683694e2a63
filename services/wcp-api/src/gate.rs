//! Authorization gate
//!
//! The only place credential trust is established. For every gated request:
//!
//! 1. Take the bearer credential from `Authorization: Bearer <token>`, or on
//!    download routes from the `token` query parameter. Neither present: 403.
//! 2. Resolve the access credential and its nested refresh credential. Any
//!    failure: 401.
//! 3. An identity whose account-active flag is `false`: 401, same body.
//! 4. Insert the [`ResolvedIdentity`] into the request extensions and run
//!    the handler. Handlers read it through [`Authenticated`].
//!
//! Verification finishes before the handler is called.

use std::collections::HashMap;

use axum::extract::{FromRequestParts, Query, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, info};
use wcp_auth::{ResolvedIdentity, SecretKey, resolve_identity, unix_millis};

use crate::AppState;
use crate::error::ApiError;
use crate::metrics;
use crate::request_id;

/// Query parameter accepted on download routes
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Where the gate may look for the bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Header,
    HeaderOrQuery,
}

/// Why the gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingCredential,
    InvalidCredential,
    InactiveAccount,
}

impl Rejection {
    fn outcome(self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidCredential => "invalid_credential",
            Self::InactiveAccount => "inactive_account",
        }
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::MissingCredential => ApiError::Forbidden,
            Rejection::InvalidCredential => ApiError::Unauthorized,
            Rejection::InactiveAccount => ApiError::InactiveAccount,
        }
    }
}

/// Verified caller identity, extracted from what the gate attached.
#[derive(Debug, Clone)]
pub struct Authenticated(pub ResolvedIdentity);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ResolvedIdentity>()
            .cloned()
            .map(Authenticated)
            .ok_or(ApiError::Unauthorized)
    }
}

/// Gate for routes that take the credential from the header only.
pub async fn require_identity(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    gate(&state, request, next, TokenSource::Header).await
}

/// Gate for download-style routes, where clients cannot always set headers.
pub async fn require_identity_or_query(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    gate(&state, request, next, TokenSource::HeaderOrQuery).await
}

async fn gate(state: &AppState, mut request: Request, next: Next, source: TokenSource) -> Response {
    let request_id = request_id::of(&request);
    let token = bearer_token(request.headers(), request.uri(), source);

    match authorize(token.as_deref(), &state.key, unix_millis()) {
        Ok(identity) => {
            metrics::record_gate_decision("allowed");
            debug!(request_id, device_id = %identity.device_id, "request authorized");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(rejection) => {
            metrics::record_gate_decision(rejection.outcome());
            info!(
                request_id,
                reason = rejection.outcome(),
                path = %request.uri().path(),
                "request rejected"
            );
            ApiError::from(rejection).into_response()
        }
    }
}

/// Decide whether `token` grants access at `now_ms`.
pub fn authorize(
    token: Option<&str>,
    key: &SecretKey,
    now_ms: u64,
) -> Result<ResolvedIdentity, Rejection> {
    let token = token.ok_or(Rejection::MissingCredential)?;
    let identity =
        resolve_identity(token, key, now_ms).map_err(|_| Rejection::InvalidCredential)?;

    if identity.account_active() == Some(false) {
        return Err(Rejection::InactiveAccount);
    }
    Ok(identity)
}

/// Pull the presented credential out of the request.
///
/// A present `Authorization` header counts as a presented credential even
/// when it is not in `Bearer <token>` form; it then yields an empty token
/// that fails verification. The query parameter is consulted only when the
/// header is absent and `source` allows it.
pub fn bearer_token(headers: &HeaderMap, uri: &Uri, source: TokenSource) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim().to_string())
            .unwrap_or_default();
        return Some(token);
    }

    if source == TokenSource::HeaderOrQuery {
        let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
        return params
            .get(TOKEN_QUERY_PARAM)
            .filter(|token| !token.is_empty())
            .cloned();
    }

    None
}
