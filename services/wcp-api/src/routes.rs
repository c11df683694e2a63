//! Issuance and session handlers
//!
//! `/auth/*` mints credentials; `/session*` sits behind the gate and only
//! reads the identity the gate attached.

use std::time::Instant;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::header;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wcp_auth::{
    ACTIVE_CLAIM, CapabilityGrant, LoginInput, issue_access_credential, issue_refresh_credential,
    unix_millis, verify_refresh_credential,
};

use crate::AppState;
use crate::error::ApiError;
use crate::gate::Authenticated;
use crate::metrics;
use crate::request_id::RequestId;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Non-secret view of the caller's identity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub email: String,
    #[serde(rename = "deviceID")]
    pub device_id: String,
    pub device_address: String,
    pub issued_at: u64,
    pub expires_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// `POST /auth/login`: check the login with the identity provider, then
/// mint a refresh credential carrying it.
pub async fn login(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(mut input) = payload.map_err(|e| ApiError::MalformedRequest(e.body_text()))?;
    input.validate()?;

    let grant = exchange(&state, &request_id, &input.email, &input.password).await?;
    // Credentials carrying is_active=false never pass the gate.
    if grant.account_active == Some(false) {
        info!(request_id, device_id = %input.device_id, "login denied for inactive account");
        return Err(ApiError::InactiveAccount);
    }
    if let Some(active) = grant.account_active {
        input
            .extensions
            .insert(ACTIVE_CLAIM.into(), serde_json::Value::Bool(active));
    }

    let refresh_token = issue_refresh_credential(&input, &state.key, state.refresh_lifetime)?;
    metrics::record_issued("refresh");
    info!(request_id, device_id = %input.device_id, "login accepted");

    Ok(Json(LoginResponse { refresh_token }))
}

/// `POST /auth/refresh`: open the refresh credential, replay its login to
/// the identity provider, and sign an access credential around it.
pub async fn refresh(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::MalformedRequest(e.body_text()))?;
    if body.refresh_token.is_empty() {
        return Err(ApiError::MalformedRequest("refreshToken is required".into()));
    }

    let claims = verify_refresh_credential(&body.refresh_token, &state.key, unix_millis())
        .map_err(|e| {
            info!(request_id, error = %e, "refresh credential rejected");
            ApiError::Unauthorized
        })?;
    let login = claims.payload;
    if login.account_active() == Some(false) {
        info!(
            request_id,
            device_id = %login.device_id,
            "refresh credential marks account inactive"
        );
        return Err(ApiError::InactiveAccount);
    }

    let grant = exchange(&state, &request_id, &login.email, &login.password).await?;
    if grant.account_active == Some(false) {
        info!(request_id, device_id = %login.device_id, "refresh denied for inactive account");
        return Err(ApiError::InactiveAccount);
    }

    let access_token = issue_access_credential(
        &body.refresh_token,
        grant.capability_token.expose(),
        &state.key,
        state.access_lifetime,
    )?;
    metrics::record_issued("access");
    info!(request_id, device_id = %login.device_id, "access credential issued");

    Ok(Json(RefreshResponse { access_token }))
}

/// `GET /session`
pub async fn session(Authenticated(identity): Authenticated) -> Json<SessionView> {
    Json(SessionView::from(&identity))
}

/// `GET /session/download`: same view, served as a file.
pub async fn session_download(Authenticated(identity): Authenticated) -> impl IntoResponse {
    (
        [(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"session.json\"",
        )],
        Json(SessionView::from(&identity)),
    )
}

impl From<&wcp_auth::ResolvedIdentity> for SessionView {
    fn from(identity: &wcp_auth::ResolvedIdentity) -> Self {
        Self {
            email: identity.email.clone(),
            device_id: identity.device_id.clone(),
            device_address: identity.device_address.clone(),
            issued_at: identity.issued_at,
            expires_at: identity.expires_at,
            is_active: identity.account_active(),
        }
    }
}

/// Call the identity provider once, recording latency and failure class.
async fn exchange(
    state: &AppState,
    request_id: &str,
    email: &str,
    password: &str,
) -> Result<CapabilityGrant, ApiError> {
    let started = Instant::now();
    let result = state.exchange.exchange(email, password).await;

    metrics::record_exchange(
        started.elapsed().as_secs_f64(),
        result.as_ref().err().map(exchange_error_type),
    );

    result.map_err(|e| {
        match &e {
            wcp_auth::Error::ExchangeRejected(_) => {
                info!(request_id, "identity provider rejected login")
            }
            _ => warn!(request_id, error = %e, "identity exchange failed"),
        }
        ApiError::from(e)
    })
}

/// `error_type` label for a failed exchange.
fn exchange_error_type(err: &wcp_auth::Error) -> &'static str {
    match err {
        wcp_auth::Error::ExchangeRejected(_) => "rejected",
        wcp_auth::Error::Http(_) => "transport",
        _ => "upstream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wcp_auth::{AccessPayload, Claims, Extensions, RefreshPayload, ResolvedIdentity};

    fn identity(active: Option<bool>) -> ResolvedIdentity {
        let mut extensions = Extensions::new();
        if let Some(active) = active {
            extensions.insert(ACTIVE_CLAIM.into(), serde_json::json!(active));
        }
        ResolvedIdentity::merge(
            Claims {
                iss: "wcp".into(),
                aud: "wcp".into(),
                iat: 100,
                exp: 200,
                payload: RefreshPayload {
                    email: "user@example.com".into(),
                    password: "hunter2".into(),
                    device_id: "sis-001".into(),
                    device_address: "10.0.0.7".into(),
                    extensions,
                },
            },
            AccessPayload {
                external_capability_token: "cap".into(),
                refresh_credential_reference: "ref".into(),
            },
        )
    }

    #[test]
    fn session_view_omits_secrets() {
        let json = serde_json::to_value(SessionView::from(&identity(Some(true)))).unwrap();
        assert_eq!(json["email"], "user@example.com");
        assert_eq!(json["deviceID"], "sis-001");
        assert_eq!(json["deviceAddress"], "10.0.0.7");
        assert_eq!(json["issuedAt"], 100);
        assert_eq!(json["expiresAt"], 200);
        assert_eq!(json["isActive"], true);

        let text = json.to_string();
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("cap"));
    }

    #[test]
    fn session_view_skips_unknown_account_state() {
        let json = serde_json::to_value(SessionView::from(&identity(None))).unwrap();
        assert!(json.get("isActive").is_none());
    }

    #[test]
    fn exchange_failures_are_classified_by_variant() {
        use wcp_auth::Error as E;
        assert_eq!(exchange_error_type(&E::ExchangeRejected("401".into())), "rejected");
        assert_eq!(exchange_error_type(&E::Http("timed out".into())), "transport");
        assert_eq!(exchange_error_type(&E::Exchange("502".into())), "upstream");
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(LoginResponse {
            refresh_token: "r".into(),
        })
        .unwrap();
        assert_eq!(json["refreshToken"], "r");

        let body: RefreshRequest =
            serde_json::from_value(serde_json::json!({"refreshToken": "r"})).unwrap();
        assert_eq!(body.refresh_token, "r");
    }
}
