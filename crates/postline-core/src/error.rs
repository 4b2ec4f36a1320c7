//! Errors raised while loading [`MailSettings`](crate::MailSettings).
//!
//! Delivery failures are reported through
//! [`DeliveryError`](crate::DeliveryError) instead.

use thiserror::Error;

/// Settings loading error.
#[derive(Debug, Error)]
pub enum Error {
    /// The settings file is not valid JSON for `MailSettings`.
    #[error("invalid settings file: {0}")]
    Serde(#[from] serde_json::Error),

    /// The settings file could not be read.
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),

    /// The settings parse but cannot be used.
    #[error("invalid settings: {0}")]
    Config(String),
}

/// Result alias for settings loading.
pub type Result<T> = std::result::Result<T, Error>;
