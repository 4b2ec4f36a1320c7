//! # postline-mime
//!
//! Composition of single-part outbound messages.
//!
//! ## Features
//!
//! - **Ordered headers**: `Date`, `From`, `To`, `Subject` and the MIME
//!   headers in a fixed order, each value sanitized against header injection
//! - **RFC 2047**: non-ASCII subjects and display names become folded
//!   base64 encoded words
//! - **Framing**: dot-stuffed CRLF payloads for SMTP, LF output for a local
//!   `sendmail`
//!
//! ## Quick Start
//!
//! ```ignore
//! use postline_mime::OutboundMessage;
//!
//! let message = OutboundMessage::builder()
//!     .from("no-reply@example.com")
//!     .from_name("Postline")
//!     .to("user@example.com")
//!     .subject("Your code")
//!     .text_body("Your one-time code is: 123456")
//!     .build()?;
//!
//! let payload = message.payload();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod encoding;
pub mod error;
pub mod header;
pub mod message;

pub use error::{Error, Result};
pub use header::Headers;
pub use message::{
    BodyKind, CHARSET, DEFAULT_FROM_NAME, MessageBuilder, OutboundMessage, SubjectEncoding,
    dot_stuff,
};
