//! # postline-smtp
//!
//! A minimal SMTP submission client for single-recipient transactional mail.
//!
//! ## Features
//!
//! - **Type-state connection management**: Compile-time enforcement of valid
//!   SMTP state transitions
//! - **Protocol subset**: EHLO, STARTTLS, AUTH LOGIN, MAIL FROM, RCPT TO, DATA, QUIT
//! - **TLS support**: Both implicit TLS (port 465) and STARTTLS (port 587)
//! - **Step-tagged errors**: every failure names the phase that aborted
//!
//! ## Quick Start
//!
//! ```ignore
//! use postline_smtp::{Address, Envelope, Security, SmtpConfig, SmtpSession};
//!
//! #[tokio::main]
//! async fn main() -> postline_smtp::Result<()> {
//!     let config = SmtpConfig::builder("smtp.example.com")
//!         .security(Security::StartTls)
//!         .credentials("user@example.com", "password")
//!         .client_hostname("app.example.com")
//!         .build();
//!
//!     let envelope = Envelope::new(
//!         Address::new("no-reply@example.com")?,
//!         Address::new("recipient@example.com")?,
//!     );
//!
//!     let payload = b"Subject: Test\r\n\r\nHello, World!";
//!     SmtpSession::new(config).send(&envelope, payload).await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── auth_login() ───→ Authenticated
//! └──────────────┘                             │
//!        │                                     │
//!        └─── mail_from() ───→ MailTransaction ←┘ ───→ RecipientAdded ───→ Data
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Connection management and type-state client
//! - [`parser`]: Response parser
//! - [`session`]: One-shot delivery driver
//! - [`types`]: Core SMTP types (addresses, replies, steps)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod session;
pub mod types;

pub use command::DATA_TERMINATOR;
pub use connection::{
    Authenticated, Client, Connected, Credentials, Data, MailTransaction, RecipientAdded,
    Security, SmtpConfig, SmtpConfigBuilder,
};
pub use error::{Error, ErrorKind, Result};
pub use session::{Envelope, SmtpSession};
pub use types::{Address, Reply, ReplyClass, ReplyCode, Step};
