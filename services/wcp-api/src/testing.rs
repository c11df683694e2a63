//! Shared fixtures for handler and router tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use common::Secret;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use wcp_auth::{CapabilityGrant, Error, IdentityExchange, Result, SecretKey};

use crate::AppState;

pub const EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "hunter2";
/// Login that makes the fake provider fail as if it were down
pub const UNAVAILABLE_EMAIL: &str = "down@example.com";

/// In-memory identity provider accepting one fixed login.
pub struct FakeExchange {
    active: std::sync::Mutex<Option<bool>>,
    calls: AtomicUsize,
}

impl FakeExchange {
    pub fn with_active(active: Option<bool>) -> Self {
        Self {
            active: std::sync::Mutex::new(active),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_active(&self, active: Option<bool>) {
        *self.active.lock().unwrap() = active;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdentityExchange for FakeExchange {
    fn exchange<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CapabilityGrant>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = *self.active.lock().unwrap();
        Box::pin(async move {
            if email == UNAVAILABLE_EMAIL {
                return Err(Error::Exchange("identity provider returned 503".into()));
            }
            if email != EMAIL || password != PASSWORD {
                return Err(Error::ExchangeRejected("identity provider returned 401".into()));
            }
            Ok(CapabilityGrant {
                capability_token: Secret::new("cap-test".to_string()),
                account_active: active,
            })
        })
    }
}

pub fn key() -> SecretKey {
    SecretKey::from_bytes(vec![42u8; 32]).unwrap()
}

/// Handle that is not installed globally, so tests can build many.
pub fn prometheus_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

pub fn app_state(exchange: Arc<FakeExchange>) -> AppState {
    AppState {
        key: Arc::new(key()),
        refresh_lifetime: Duration::from_secs(600),
        access_lifetime: Duration::from_secs(60),
        exchange,
        prometheus: prometheus_handle(),
        started_at: Instant::now(),
    }
}
