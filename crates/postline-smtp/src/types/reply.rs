//! SMTP reply types.

use std::fmt;

/// A complete server reply.
///
/// Multi-line replies keep the text of every line; `code` is taken from the
/// final line only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Text of each line, without code and separator.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true if the code is one of `expected`.
    #[must_use]
    pub fn is_one_of(&self, expected: &[ReplyCode]) -> bool {
        expected.contains(&self.code)
    }

    /// All lines joined with `\n`.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }
}

/// First digit of a reply code (RFC 5321 section 4.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 1xx
    Preliminary,
    /// 2xx
    Completed,
    /// 3xx, more input expected (AUTH challenge, DATA)
    Intermediate,
    /// 4xx, the same command may succeed later
    Transient,
    /// 5xx
    Permanent,
}

/// Three-digit reply code in `100..=599`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 greeting, also the go-ahead for STARTTLS
    pub const SERVICE_READY: Self = Self(220);
    /// 221 closing channel
    pub const CLOSING: Self = Self(221);
    /// 235 authentication succeeded
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 action completed
    pub const OK: Self = Self(250);
    /// 251 user not local, will forward
    pub const FORWARD: Self = Self(251);
    /// 334 AUTH challenge
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 service not available
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450 mailbox busy
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 535 credentials rejected
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 mailbox unavailable
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 554 transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);

    /// Wraps a code without range checks. Intended for constants and tests.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the code if it lies in `100..=599`.
    #[must_use]
    pub const fn checked(code: u16) -> Option<Self> {
        match code {
            100..=599 => Some(Self(code)),
            _ => None,
        }
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Classifies the code by its first digit.
    #[must_use]
    pub const fn class(self) -> ReplyClass {
        match self.0 / 100 {
            0 | 1 => ReplyClass::Preliminary,
            2 => ReplyClass::Completed,
            3 => ReplyClass::Intermediate,
            4 => ReplyClass::Transient,
            _ => ReplyClass::Permanent,
        }
    }

    /// Returns true for 4xx codes.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self.class(), ReplyClass::Transient)
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
