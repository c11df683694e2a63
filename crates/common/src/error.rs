//! Startup error types shared by the service crates

use thiserror::Error;

/// Errors raised while loading configuration and key material.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_the_problem() {
        let err = Error::Config("secret key is required".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: secret key is required"
        );
    }

    #[test]
    fn io_and_toml_errors_convert() {
        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "wcp-api.toml").into();
        assert!(io.to_string().starts_with("I/O error:"), "got: {io}");

        let toml: Error = toml::from_str::<toml::Table>("= broken").unwrap_err().into();
        assert!(toml.to_string().starts_with("TOML parse error:"), "got: {toml}");
    }
}
