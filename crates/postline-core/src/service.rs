//! Transactional mail service.
//!
//! [`MailService`] is the one entry point the rest of an application uses:
//! hand it a recipient, subject and body and get back a
//! [`DeliveryOutcome`]. Each call resolves the delivery mode afresh, opens
//! its own connection (or runs its own sendmail) and records failures in
//! the configured [`FailureLog`].

use std::fmt;
use std::str::FromStr;

use postline_mime::{BodyKind, DEFAULT_FROM_NAME, OutboundMessage};
use postline_smtp::{Envelope, ErrorKind, SmtpSession, Step};

use crate::fallback::{Sendmail, SendmailError};
use crate::log::{FailureEntry, FailureLog, FileLog, single_line};
use crate::mode::DeliveryMode;
use crate::settings::{MailSettings, normalize_address};

/// Longest server text kept in a failure log line.
const LOGGED_TEXT_LIMIT: usize = 200;

/// sysexits.h status for a temporary failure.
pub const EX_TEMPFAIL: i32 = 75;

/// Why a delivery failed.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// SMTP is partially configured.
    #[error("SMTP config is incomplete, missing {}", .missing.join(", "))]
    Config {
        /// Unset variables.
        missing: Vec<&'static str>,
    },

    /// The recipient (or a composed header address) is malformed.
    #[error("invalid address: {0}")]
    Validation(String),

    /// The SMTP session failed.
    #[error(transparent)]
    Smtp(#[from] postline_smtp::Error),

    /// The local sendmail failed.
    #[error("local delivery failed: {0}")]
    Fallback(#[from] SendmailError),
}

/// Coarse classification of a [`DeliveryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Partial SMTP configuration; nothing was attempted.
    Config,
    /// Malformed address; nothing was attempted.
    Validation,
    /// Could not reach the server.
    Connect,
    /// Unexpected reply or mid-session failure.
    Protocol,
    /// TLS negotiation failed.
    Tls,
    /// AUTH LOGIN rejected.
    Auth,
    /// Local sendmail failed.
    Fallback,
}

impl DeliveryError {
    /// Returns the failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Config { .. } => FailureKind::Config,
            Self::Validation(_) => FailureKind::Validation,
            Self::Fallback(_) => FailureKind::Fallback,
            Self::Smtp(e) => match e.kind() {
                ErrorKind::Connect => FailureKind::Connect,
                ErrorKind::Protocol => FailureKind::Protocol,
                ErrorKind::Tls => FailureKind::Tls,
                ErrorKind::Auth => FailureKind::Auth,
                ErrorKind::InvalidAddress => FailureKind::Validation,
            },
        }
    }

    /// Returns the protocol step that failed, for SMTP failures.
    #[must_use]
    pub const fn step(&self) -> Option<Step> {
        match self {
            Self::Smtp(e) => e.step(),
            _ => None,
        }
    }

    /// Returns true if the same delivery may succeed later: a 4xx SMTP
    /// reply, a sendmail timeout, or sendmail exiting with `EX_TEMPFAIL`.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Smtp(e) => e.is_transient(),
            Self::Fallback(SendmailError::Timeout(_)) => true,
            Self::Fallback(SendmailError::Exit { status, .. }) => {
                status.code() == Some(EX_TEMPFAIL)
            }
            _ => false,
        }
    }

    /// Single-line description for the failure log, with server text cut
    /// to 200 characters.
    #[must_use]
    pub fn log_message(&self) -> String {
        match self {
            Self::Smtp(
                postline_smtp::Error::Protocol {
                    step,
                    code: Some(code),
                    text,
                }
                | postline_smtp::Error::Auth {
                    step, code, text, ..
                },
            ) => format!("{step} failed with {code}: {}", clip(text)),
            other => clip(&other.to_string()),
        }
    }
}

fn clip(text: &str) -> String {
    single_line(text)
        .chars()
        .take(LOGGED_TEXT_LIMIT)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Result of one delivery attempt.
#[derive(Debug)]
#[must_use]
pub enum DeliveryOutcome {
    /// Accepted by the relay or the local sendmail.
    Sent,
    /// Not delivered.
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    /// Returns true if the message was accepted.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&DeliveryError> {
        match self {
            Self::Sent => None,
            Self::Failed(e) => Some(e),
        }
    }

    /// Converts into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the delivery error when the message was not sent.
    pub fn into_result(self) -> Result<(), DeliveryError> {
        match self {
            Self::Sent => Ok(()),
            Self::Failed(e) => Err(e),
        }
    }
}

/// Language of the one-time-code message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Language {
    /// English.
    #[default]
    En,
    /// Spanish.
    Es,
}

impl Language {
    /// Returns the language tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
        }
    }

    fn otp_subject(self, brand: &str) -> String {
        match self {
            Self::En => format!("{brand} password recovery code"),
            Self::Es => format!("Codigo de recuperacion {brand}"),
        }
    }

    fn otp_body(self, code: &str) -> String {
        match self {
            Self::En => format!("Your one-time code is: {code}. It expires in a few minutes."),
            Self::Es => format!("Tu codigo temporal es: {code}. Expira en unos minutos."),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a language tag is not supported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language {0:?} (expected en or es)")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "es" => Ok(Self::Es),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

/// Per-recipient results of [`MailService::send_campaign`].
#[derive(Debug, Default)]
pub struct CampaignReport {
    /// Recipients whose message was accepted.
    pub sent: Vec<String>,
    /// Recipients whose message failed, with the reason.
    pub failed: Vec<(String, DeliveryError)>,
}

impl CampaignReport {
    /// Number of accepted messages.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    /// Number of failed messages.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Returns true if every message was accepted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sends transactional mail with the configured relay or local sendmail.
#[derive(Debug, Clone)]
pub struct MailService<L = FileLog> {
    settings: MailSettings,
    log: L,
}

impl MailService<FileLog> {
    /// Creates a service logging failures to `settings.log_path`.
    #[must_use]
    pub fn from_settings(settings: MailSettings) -> Self {
        let log = FileLog::new(settings.log_path.clone());
        Self::new(settings, log)
    }
}

impl<L: FailureLog> MailService<L> {
    /// Creates a service with an explicit failure log.
    #[must_use]
    pub const fn new(settings: MailSettings, log: L) -> Self {
        Self { settings, log }
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &MailSettings {
        &self.settings
    }

    /// Returns the failure log.
    #[must_use]
    pub const fn log(&self) -> &L {
        &self.log
    }

    /// Sends a plain text message.
    pub async fn send_transactional_message(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> DeliveryOutcome {
        self.deliver(to, subject, body, BodyKind::PlainText).await
    }

    /// Sends an HTML message.
    pub async fn send_campaign_message(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> DeliveryOutcome {
        self.deliver(to, subject, html_body, BodyKind::Html).await
    }

    /// Sends a localized one-time code.
    ///
    /// The code itself never appears in logs.
    pub async fn send_otp(&self, to: &str, code: &str, language: Language) -> DeliveryOutcome {
        let subject = language.otp_subject(self.brand());
        let body = language.otp_body(code);
        self.deliver(to, &subject, &body, BodyKind::PlainText).await
    }

    /// Sends the same HTML message to every recipient, one connection
    /// each. A failure for one recipient does not stop the others.
    pub async fn send_campaign<S>(
        &self,
        recipients: &[S],
        subject: &str,
        html_body: &str,
    ) -> CampaignReport
    where
        S: AsRef<str> + Sync,
    {
        let mut report = CampaignReport::default();
        for recipient in recipients {
            let recipient = recipient.as_ref();
            match self.send_campaign_message(recipient, subject, html_body).await {
                DeliveryOutcome::Sent => report.sent.push(recipient.to_string()),
                DeliveryOutcome::Failed(e) => report.failed.push((recipient.to_string(), e)),
            }
        }
        tracing::info!(
            sent = report.sent_count(),
            failed = report.failed_count(),
            "Campaign finished"
        );
        report
    }

    fn brand(&self) -> &str {
        match self.settings.from_name.trim() {
            "" => DEFAULT_FROM_NAME,
            name => name,
        }
    }

    async fn deliver(&self, to: &str, subject: &str, body: &str, kind: BodyKind) -> DeliveryOutcome {
        match self.try_deliver(to, subject, body, kind).await {
            Ok(()) => DeliveryOutcome::Sent,
            Err(e) => {
                self.report(to, &e).await;
                DeliveryOutcome::Failed(e)
            }
        }
    }

    async fn try_deliver(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        kind: BodyKind,
    ) -> Result<(), DeliveryError> {
        let recipient =
            normalize_address(to).ok_or_else(|| DeliveryError::Validation(to.trim().to_string()))?;

        let sender = self.settings.sender();
        let builder = OutboundMessage::builder()
            .from(sender.as_str())
            .from_name(self.settings.from_name.as_str())
            .to(recipient.as_str())
            .subject(subject);
        let builder = match kind {
            BodyKind::PlainText => builder.text_body(body),
            BodyKind::Html => builder.html_body(body),
        };

        match DeliveryMode::resolve(&self.settings) {
            DeliveryMode::Misconfigured { missing } => Err(DeliveryError::Config { missing }),
            DeliveryMode::Ready(config) => {
                let message = builder.build().map_err(compose_error)?;
                let envelope = Envelope::new(message.from().clone(), message.to().clone());
                SmtpSession::new(config)
                    .send(&envelope, &message.payload())
                    .await?;
                Ok(())
            }
            DeliveryMode::Fallback => {
                let message = builder
                    .reply_to(sender.as_str())
                    .build()
                    .map_err(compose_error)?;
                Sendmail::new(&self.settings.sendmail_path)
                    .timeout(self.settings.timeout())
                    .send(&message.to_sendmail())
                    .await?;
                tracing::info!(to = %recipient, "Message handed to local sendmail");
                Ok(())
            }
        }
    }

    async fn report(&self, to: &str, error: &DeliveryError) {
        let recipient = to.trim();
        tracing::warn!(
            to = recipient,
            kind = ?error.kind(),
            transient = error.is_transient(),
            step = error.step().map(Step::as_str),
            error = %error,
            "Mail delivery failed"
        );
        self.log
            .record(&FailureEntry::now(recipient, &error.log_message()))
            .await;
    }
}

fn compose_error(e: postline_mime::Error) -> DeliveryError {
    DeliveryError::Validation(e.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use postline_smtp::ReplyCode;

    fn partial_settings() -> MailSettings {
        MailSettings {
            host: "smtp.example.com".to_string(),
            ..MailSettings::default()
        }
    }

    #[test]
    fn test_kind_mapping() {
        let err = DeliveryError::Smtp(postline_smtp::Error::Auth {
            step: Step::AuthPass,
            code: ReplyCode::AUTH_FAILED,
            text: "nope".to_string(),
        });
        assert_eq!(err.kind(), FailureKind::Auth);
        assert_eq!(err.step(), Some(Step::AuthPass));

        let err = DeliveryError::Config {
            missing: vec!["SMTP_USER"],
        };
        assert_eq!(err.kind(), FailureKind::Config);
        assert_eq!(err.step(), None);
        assert_eq!(err.to_string(), "SMTP config is incomplete, missing SMTP_USER");
    }

    #[test]
    fn test_transient_failures() {
        let busy = DeliveryError::Smtp(postline_smtp::Error::protocol(
            Step::RcptTo,
            Some(ReplyCode::MAILBOX_BUSY),
            "try later",
        ));
        assert!(busy.is_transient());

        let rejected = DeliveryError::Smtp(postline_smtp::Error::protocol(
            Step::RcptTo,
            Some(ReplyCode::MAILBOX_UNAVAILABLE),
            "no such user",
        ));
        assert!(!rejected.is_transient());
        assert!(!DeliveryError::Validation("x".to_string()).is_transient());
        assert!(
            DeliveryError::Fallback(SendmailError::Timeout(std::time::Duration::from_secs(1)))
                .is_transient()
        );
    }

    #[test]
    fn test_log_message_clips_server_text() {
        let err = DeliveryError::Smtp(postline_smtp::Error::protocol(
            Step::RcptTo,
            Some(ReplyCode::MAILBOX_UNAVAILABLE),
            format!("No such user\n{}", "x".repeat(500)),
        ));
        let message = err.log_message();
        assert!(message.starts_with("RCPT TO failed with 550: No such user x"));
        assert!(!message.contains('\n'));
        assert_eq!(message.chars().count(), "RCPT TO failed with 550: ".len() + 200);
    }

    #[test]
    fn test_language_parse() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert_eq!(" es ".parse::<Language>().unwrap(), Language::Es);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_otp_texts() {
        assert_eq!(
            Language::En.otp_subject("Postline"),
            "Postline password recovery code"
        );
        assert_eq!(
            Language::Es.otp_body("123456"),
            "Tu codigo temporal es: 123456. Expira en unos minutos."
        );
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_validation_error() {
        let log = MemoryLog::new();
        let service = MailService::new(partial_settings(), log.clone());

        let outcome = service
            .send_transactional_message("not an address", "Hi", "Body")
            .await;

        let err = outcome.error().unwrap();
        assert_eq!(err.kind(), FailureKind::Validation);
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].recipient, "not an address");
    }

    #[tokio::test]
    async fn test_malformed_recipient_cannot_forge_log_lines() {
        let log = MemoryLog::new();
        let service = MailService::new(partial_settings(), log.clone());

        let outcome = service
            .send_transactional_message("x\n[2099-01-01 00:00:00] forged: line", "Hi", "Body")
            .await;

        assert_eq!(outcome.error().unwrap().kind(), FailureKind::Validation);
        let lines = log.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].lines().count(), 1);
        assert!(lines[0].contains("] x [2099-01-01 00:00:00] forged: line: "));
    }

    #[tokio::test]
    async fn test_partial_config_fails_without_io() {
        let log = MemoryLog::new();
        let service = MailService::new(partial_settings(), log.clone());

        let outcome = service
            .send_transactional_message(" User@Example.com ", "Hi", "Body")
            .await;

        let Some(DeliveryError::Config { missing }) = outcome.error() else {
            panic!("expected Config error, got {outcome:?}");
        };
        assert_eq!(missing, &vec!["SMTP_USER", "SMTP_PASS"]);
        assert!(log.lines()[0].ends_with(
            "User@Example.com: SMTP config is incomplete, missing SMTP_USER, SMTP_PASS"
        ));
    }

    #[tokio::test]
    async fn test_otp_code_not_logged() {
        let log = MemoryLog::new();
        let service = MailService::new(partial_settings(), log.clone());

        let outcome = service
            .send_otp("user@example.com", "918273", Language::Es)
            .await;

        assert!(!outcome.is_sent());
        assert!(log.lines().iter().all(|line| !line.contains("918273")));
    }

    #[test]
    fn test_campaign_report_counts() {
        let report = CampaignReport {
            sent: vec!["a@example.com".to_string()],
            failed: vec![(
                "b@example.com".to_string(),
                DeliveryError::Validation("b".to_string()),
            )],
        };
        assert_eq!(report.sent_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(!report.is_complete());
    }
}
