//! # postline-core
//!
//! Transactional mail delivery for applications.
//!
//! This crate provides:
//! - Settings loaded from the environment or a JSON file
//! - Delivery mode resolution (SMTP relay, local sendmail, or misconfigured)
//! - Local `sendmail` fallback
//! - An append-only failure log
//! - [`MailService`], the single entry point for sending mail

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod fallback;
pub mod log;
pub mod mode;
pub mod service;
pub mod settings;

pub use error::{Error, Result};
pub use fallback::{Sendmail, SendmailError};
pub use log::{FailureEntry, FailureLog, FileLog, MemoryLog};
pub use mode::DeliveryMode;
pub use service::{
    CampaignReport, DeliveryError, DeliveryOutcome, EX_TEMPFAIL, FailureKind, Language,
    MailService, UnknownLanguage,
};
pub use settings::{FALLBACK_SENDER, MailSettings, normalize_address};
