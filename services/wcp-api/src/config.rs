//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The secret key is loaded from the WCP_SECRET_KEY env var or
//! `tokens.secret_key_file`, never from the TOML body, so it cannot leak
//! through a checked-in config file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use wcp_auth::{DEFAULT_ACCESS_EXPIRY, DEFAULT_REFRESH_EXPIRY, SecretKey, parse_expiry};

/// Environment variable carrying the process-wide secret key
pub const SECRET_KEY_ENV: &str = "WCP_SECRET_KEY";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    pub identity: IdentityConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Credential lifetimes and key material
#[derive(Debug, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_refresh_expiry")]
    pub refresh_expiry: String,
    #[serde(default = "default_access_expiry")]
    pub access_expiry: String,
    /// Path to a file containing the secret key (alternative to WCP_SECRET_KEY)
    #[serde(default)]
    pub secret_key_file: Option<PathBuf>,
    #[serde(skip)]
    pub secret_key: Option<SecretKey>,
    #[serde(skip)]
    pub refresh_lifetime: Duration,
    #[serde(skip)]
    pub access_lifetime: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_expiry: default_refresh_expiry(),
            access_expiry: default_access_expiry(),
            secret_key_file: None,
            secret_key: None,
            refresh_lifetime: Duration::ZERO,
            access_lifetime: Duration::ZERO,
        }
    }
}

/// External identity provider settings
#[derive(Debug, Deserialize)]
pub struct IdentityConfig {
    pub exchange_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_max_connections() -> usize {
    1000
}

fn default_refresh_expiry() -> String {
    DEFAULT_REFRESH_EXPIRY.to_string()
}

fn default_access_expiry() -> String {
    DEFAULT_ACCESS_EXPIRY.to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Config {
    /// Load configuration from a TOML file, then resolve the secret key and
    /// parse credential lifetimes.
    ///
    /// Secret key resolution order:
    /// 1. WCP_SECRET_KEY env var
    /// 2. secret_key_file path from config
    ///
    /// A missing or malformed key is an error: the service cannot issue or
    /// verify anything without one.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.identity.exchange_url.starts_with("http://")
            && !config.identity.exchange_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "exchange_url must start with http:// or https://, got: {}",
                config.identity.exchange_url
            )));
        }

        if config.identity.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        config.tokens.refresh_lifetime = parse_expiry(&config.tokens.refresh_expiry)
            .map_err(|e| common::Error::Config(format!("refresh_expiry: {e}")))?;
        config.tokens.access_lifetime = parse_expiry(&config.tokens.access_expiry)
            .map_err(|e| common::Error::Config(format!("access_expiry: {e}")))?;

        let raw_key = if let Ok(key) = std::env::var(SECRET_KEY_ENV) {
            key
        } else if let Some(ref key_file) = config.tokens.secret_key_file {
            std::fs::read_to_string(key_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read secret_key_file {}: {e}",
                    key_file.display()
                ))
            })?
        } else {
            return Err(common::Error::Config(format!(
                "secret key is required: set {SECRET_KEY_ENV} or tokens.secret_key_file"
            )));
        };

        let key = SecretKey::parse(&raw_key)
            .map_err(|e| common::Error::Config(format!("invalid secret key: {e}")))?;
        config.tokens.secret_key = Some(key);

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("wcp-api.toml")
    }
}
