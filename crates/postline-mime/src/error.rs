//! Error types for message composition.

/// Result type alias for composition operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Composition error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A sender, recipient or reply-to address failed validation.
    #[error("Invalid {field} address: {source}")]
    InvalidAddress {
        /// Which address was rejected (`from`, `to`, `reply-to`).
        field: &'static str,
        /// Validation failure.
        #[source]
        source: postline_smtp::Error,
    },

    /// The message has no recipient.
    #[error("Message has no recipient")]
    MissingRecipient,

    /// The message has no sender address.
    #[error("Message has no sender")]
    MissingSender,
}
