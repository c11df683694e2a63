//! External identity exchange
//!
//! Trades raw login credentials for a capability token at the identity
//! provider. Login calls it to validate credentials before a refresh
//! credential is minted. The refresh endpoint calls it again with the login
//! replayed from the refresh credential.
//!
//! A single attempt is made per call, bounded by the configured timeout.
//! Failures are surfaced immediately and never retried here.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};

/// What the identity provider hands back for a successful exchange.
#[derive(Debug, Clone)]
pub struct CapabilityGrant {
    pub capability_token: Secret<String>,
    /// Account-active flag, when the provider reports one
    pub account_active: Option<bool>,
}

/// Abstraction over the identity provider.
///
/// Uses `Pin<Box<dyn Future>>` return types so the exchange can be held as
/// `Arc<dyn IdentityExchange>` in shared handler state.
pub trait IdentityExchange: Send + Sync {
    /// Exchange login credentials for a capability grant.
    ///
    /// Returns `ExchangeRejected` when the provider refuses the credentials,
    /// `Exchange` or `Http` for anything else.
    fn exchange<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CapabilityGrant>> + Send + 'a>>;
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    token: String,
    #[serde(default)]
    is_active: Option<bool>,
}

/// Identity exchange over HTTP: `POST {endpoint}` with a JSON login body,
/// expecting `{"token": "...", "is_active": bool?}` back.
#[derive(Clone)]
pub struct HttpIdentityExchange {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpIdentityExchange {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn post_login(&self, email: &str, password: &str) -> Result<CapabilityGrant> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&ExchangeRequest { email, password })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Http(format!("identity exchange timed out after {:?}", self.timeout))
                } else {
                    Error::Http(format!("identity exchange request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            debug!(%status, "identity provider rejected credentials");
            return Err(Error::ExchangeRejected(format!(
                "identity provider returned {status}"
            )));
        }
        if !status.is_success() {
            warn!(%status, "identity provider returned an error");
            return Err(Error::Exchange(format!(
                "identity provider returned {status}"
            )));
        }

        let body = response
            .json::<ExchangeResponse>()
            .await
            .map_err(|e| Error::Exchange(format!("invalid identity provider response: {e}")))?;
        if body.token.is_empty() {
            return Err(Error::Exchange(
                "identity provider returned an empty token".into(),
            ));
        }

        Ok(CapabilityGrant {
            capability_token: Secret::new(body.token),
            account_active: body.is_active,
        })
    }
}

impl IdentityExchange for HttpIdentityExchange {
    fn exchange<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CapabilityGrant>> + Send + 'a>> {
        Box::pin(self.post_login(email, password))
    }
}
