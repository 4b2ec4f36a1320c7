//! SMTP command builder.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::types::Address;

/// End-of-data marker sent after the payload.
///
/// The leading CRLF terminates the payload's last line, so the marker is a
/// line containing only `.` no matter how the body ended.
pub const DATA_TERMINATOR: &[u8] = b"\r\n.\r\n";

/// One client command line.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// `EHLO <hostname>`
    Ehlo {
        /// Name announced to the server
        hostname: String,
    },
    /// `STARTTLS`
    StartTls,
    /// `AUTH LOGIN`
    AuthLogin,
    /// Base64 answer to a 334 challenge
    AuthResponse(String),
    /// `MAIL FROM:<address>`
    MailFrom {
        /// Envelope sender
        from: Address,
    },
    /// `RCPT TO:<address>`
    RcptTo {
        /// Envelope recipient
        to: Address,
    },
    /// `DATA`
    Data,
    /// `QUIT`
    Quit,
}

impl Command {
    /// Builds the base64 answer line for an AUTH LOGIN challenge.
    #[must_use]
    pub fn auth_response(secret: &str) -> Self {
        Self::AuthResponse(STANDARD.encode(secret.as_bytes()))
    }

    /// The command line without its CRLF.
    fn line(&self) -> Cow<'_, str> {
        match self {
            Self::Ehlo { hostname } => format!("EHLO {hostname}").into(),
            Self::StartTls => "STARTTLS".into(),
            Self::AuthLogin => "AUTH LOGIN".into(),
            Self::AuthResponse(encoded) => encoded.as_str().into(),
            Self::MailFrom { from } => format!("MAIL FROM:<{from}>").into(),
            Self::RcptTo { to } => format!("RCPT TO:<{to}>").into(),
            Self::Data => "DATA".into(),
            Self::Quit => "QUIT".into(),
        }
    }

    /// Serializes the command to its CRLF-terminated wire form.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let line = self.line();
        let mut buf = Vec::with_capacity(line.len() + 2);
        buf.extend_from_slice(line.as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

// AUTH answers carry credentials, so they never show up in debug output.
impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthResponse(_) => f.write_str("<auth response>"),
            other => f.write_str(&other.line()),
        }
    }
}
