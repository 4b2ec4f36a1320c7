//! SMTP connection management with type-state pattern.

mod client;
mod config;
mod stream;

pub use client::{Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded};
pub use config::{
    Credentials, DEFAULT_TIMEOUT, Security, SmtpConfig, SmtpConfigBuilder, UnknownSecurity,
};
pub use stream::{SmtpStream, connect};
