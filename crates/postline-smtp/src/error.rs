//! Error types for SMTP operations.

use std::io;

use crate::types::{ReplyCode, Step};

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Every variant that happens on the wire carries the [`Step`] at which the
/// session was aborted.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// TCP connection could not be established.
    #[error("connect error: {0}")]
    Connect(#[source] io::Error),

    /// TLS handshake (implicit or after STARTTLS) failed.
    #[error("{step} failed: TLS negotiation failed: {message}")]
    Tls {
        /// Step during which the handshake was attempted.
        step: Step,
        /// Handshake failure description.
        message: String,
    },

    /// Server replied with a code outside the expected set, or sent a
    /// malformed reply.
    #[error("{step} failed with {}: {text}", display_code(.code))]
    Protocol {
        /// Step that failed.
        step: Step,
        /// Reply code, when one could be parsed.
        code: Option<ReplyCode>,
        /// Server text or parser diagnostic.
        text: String,
    },

    /// Server rejected one of the AUTH LOGIN exchanges.
    #[error("{step} failed with {code}: {text}")]
    Auth {
        /// AUTH sub-step that failed.
        step: Step,
        /// Reply code.
        code: ReplyCode,
        /// Server text.
        text: String,
    },

    /// No reply arrived within the configured timeout.
    #[error("{step} timed out")]
    Timeout {
        /// Step that timed out.
        step: Step,
    },

    /// Socket read or write failed mid-session.
    #[error("{step} I/O error: {source}")]
    Io {
        /// Step that failed.
        step: Step,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

fn display_code(code: &Option<ReplyCode>) -> String {
    code.map_or_else(|| "no code".to_string(), |c| c.to_string())
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Socket failure or timeout before the greeting.
    Connect,
    /// Unexpected or malformed reply, or failure mid-session.
    Protocol,
    /// TLS negotiation failure.
    Tls,
    /// AUTH LOGIN rejected.
    Auth,
    /// Address failed validation; no I/O was attempted.
    InvalidAddress,
}

impl Error {
    /// Creates a protocol error for an unexpected reply.
    #[must_use]
    pub fn protocol(step: Step, code: Option<ReplyCode>, text: impl Into<String>) -> Self {
        Self::Protocol {
            step,
            code,
            text: text.into(),
        }
    }

    /// Returns the error classification.
    ///
    /// Timeouts and I/O failures count as connect errors while the session
    /// is still waiting for the greeting, and as protocol errors afterwards.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect(_) => ErrorKind::Connect,
            Self::Tls { .. } => ErrorKind::Tls,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::InvalidAddress(_) => ErrorKind::InvalidAddress,
            Self::Timeout { step } | Self::Io { step, .. } if matches!(step, Step::Connect) => {
                ErrorKind::Connect
            }
            Self::Protocol { .. } | Self::Timeout { .. } | Self::Io { .. } => ErrorKind::Protocol,
        }
    }

    /// Returns the step at which the session was aborted.
    #[must_use]
    pub const fn step(&self) -> Option<Step> {
        match self {
            Self::Connect(_) => Some(Step::Connect),
            Self::Tls { step, .. }
            | Self::Protocol { step, .. }
            | Self::Auth { step, .. }
            | Self::Timeout { step }
            | Self::Io { step, .. } => Some(*step),
            Self::InvalidAddress(_) => None,
        }
    }

    /// Returns the server reply code, if the failure was caused by one.
    #[must_use]
    pub const fn code(&self) -> Option<ReplyCode> {
        match self {
            Self::Protocol { code, .. } => *code,
            Self::Auth { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if the server rejected with a 4xx code, so the same
    /// delivery may succeed later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.code().is_some_and(ReplyCode::is_transient)
    }
}
