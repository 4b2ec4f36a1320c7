//! One-shot submission session.
//!
//! [`SmtpSession`] drives a full delivery over a fresh connection:
//!
//! ```text
//! connect ─→ EHLO ─→ [STARTTLS ─→ EHLO] ─→ [AUTH LOGIN] ─→ MAIL FROM ─→ RCPT TO ─→ DATA ─→ payload ─→ QUIT
//! ```
//!
//! Each phase either yields the next client state or aborts the whole
//! session with an error naming the phase.

use crate::connection::{Client, Security, SmtpConfig};
use crate::error::Result;
use crate::types::Address;

/// Envelope sender and recipient of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `MAIL FROM` address.
    pub from: Address,
    /// `RCPT TO` address.
    pub to: Address,
}

impl Envelope {
    /// Creates an envelope.
    #[must_use]
    pub const fn new(from: Address, to: Address) -> Self {
        Self { from, to }
    }
}

/// Configured submission session; each [`send`](Self::send) opens its own
/// connection.
#[derive(Debug, Clone)]
pub struct SmtpSession {
    config: SmtpConfig,
}

impl SmtpSession {
    /// Creates a session for `config`.
    #[must_use]
    pub const fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// Delivers `payload` to the envelope recipient.
    ///
    /// `payload` is the composed message (headers, blank line, dot-stuffed
    /// body, CRLF line endings). The connection is dropped on every return
    /// path. Once the payload has been accepted a failing QUIT is only
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns the first failing step as an [`Error`](crate::Error).
    pub async fn send(&self, envelope: &Envelope, payload: &[u8]) -> Result<()> {
        let config = &self.config;
        tracing::debug!(
            host = %config.host,
            port = config.port,
            security = %config.security,
            "Opening SMTP session"
        );

        let client = Client::connect(config)
            .await?
            .ehlo(&config.client_hostname)
            .await?;

        let client = match config.security {
            Security::StartTls => client.starttls(config).await?,
            Security::Implicit | Security::None => client,
        };

        let client = match &config.credentials {
            Some(credentials) => {
                client
                    .auth_login(credentials)
                    .await?
                    .mail_from(envelope.from.clone())
                    .await?
            }
            None => client.mail_from(envelope.from.clone()).await?,
        };

        let client = client
            .rcpt_to(envelope.to.clone())
            .await?
            .data()
            .await?
            .send_message(payload)
            .await?;

        if let Err(e) = client.quit().await {
            tracing::debug!(error = %e, "QUIT failed after message was accepted");
        }

        tracing::info!(to = %envelope.to, host = %config.host, "Message delivered");
        Ok(())
    }
}
