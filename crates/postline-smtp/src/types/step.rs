//! Protocol steps of a submission session.

use std::fmt;

/// A phase of the submission exchange.
///
/// Errors carry the step at which the session was aborted so callers can
/// report where delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// TCP connect, implicit TLS handshake and server greeting.
    Connect,
    /// First `EHLO`.
    Ehlo,
    /// `STARTTLS` command and the TLS upgrade that follows it.
    StartTls,
    /// `EHLO` re-sent over the upgraded connection.
    EhloAfterStartTls,
    /// `AUTH LOGIN` command.
    AuthLogin,
    /// Base64 username line.
    AuthUser,
    /// Base64 password line.
    AuthPass,
    /// `MAIL FROM` envelope sender.
    MailFrom,
    /// `RCPT TO` envelope recipient.
    RcptTo,
    /// `DATA` command.
    Data,
    /// Message payload and end-of-data marker.
    Payload,
    /// `QUIT`.
    Quit,
}

impl Step {
    /// Returns the step name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Ehlo => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::EhloAfterStartTls => "EHLO after STARTTLS",
            Self::AuthLogin => "AUTH LOGIN",
            Self::AuthUser => "AUTH USER",
            Self::AuthPass => "AUTH PASS",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Data => "DATA",
            Self::Payload => "payload",
            Self::Quit => "QUIT",
        }
    }

    /// Returns true for the three AUTH LOGIN exchanges.
    #[must_use]
    pub const fn is_auth(self) -> bool {
        matches!(self, Self::AuthLogin | Self::AuthUser | Self::AuthPass)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
