//! Types shared across the WCP workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
