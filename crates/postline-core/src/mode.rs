//! Delivery mode resolution.

use postline_smtp::SmtpConfig;

use crate::settings::MailSettings;

/// How a message will be delivered.
#[derive(Debug, Clone)]
pub enum DeliveryMode {
    /// Host, username and password are all set.
    Ready(SmtpConfig),
    /// Some but not all of host, username and password are set.
    Misconfigured {
        /// Names of the unset variables.
        missing: Vec<&'static str>,
    },
    /// None of them are set; hand the message to the local sendmail.
    Fallback,
}

impl DeliveryMode {
    /// Picks the delivery mode for `settings`.
    ///
    /// Values count as set when they are non-empty after trimming.
    #[must_use]
    pub fn resolve(settings: &MailSettings) -> Self {
        let fields = [
            ("SMTP_HOST", settings.host.trim()),
            ("SMTP_USER", settings.username.trim()),
            ("SMTP_PASS", settings.password.trim()),
        ];
        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| *name)
            .collect();

        match missing.len() {
            0 => Self::Ready(smtp_config(settings)),
            n if n == fields.len() => Self::Fallback,
            _ => Self::Misconfigured { missing },
        }
    }

    /// Returns true if messages will go out over SMTP.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

fn smtp_config(settings: &MailSettings) -> SmtpConfig {
    SmtpConfig::builder(settings.host.trim())
        .port(settings.port)
        .security(settings.security)
        .credentials(settings.username.trim(), settings.password.as_str())
        .client_hostname(settings.ehlo_host())
        .timeout(settings.timeout())
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use postline_smtp::Security;
    use std::time::Duration;

    fn settings(host: &str, user: &str, pass: &str) -> MailSettings {
        MailSettings {
            host: host.to_string(),
            username: user.to_string(),
            password: pass.to_string(),
            ..MailSettings::default()
        }
    }

    #[test]
    fn test_ready() {
        let mut s = settings("smtp.example.com", "user@example.com", "secret");
        s.security = Security::Implicit;
        s.port = 465;
        s.timeout_secs = 2;
        s.client_host = "app.test".to_string();

        let DeliveryMode::Ready(config) = DeliveryMode::resolve(&s) else {
            panic!("expected Ready");
        };
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 465);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.client_hostname, "app.test");
        assert_eq!(config.io_timeout, Duration::from_secs(5));
        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.username(), "user@example.com");
        assert_eq!(credentials.password(), "secret");
    }

    #[test]
    fn test_ehlo_name_cannot_carry_commands() {
        let mut s = settings("smtp.example.com", "user@example.com", "secret");
        s.client_host = "app.test\r\nRSET".to_string();

        let DeliveryMode::Ready(config) = DeliveryMode::resolve(&s) else {
            panic!("expected Ready");
        };
        assert_eq!(config.client_hostname, "localhost");
    }

    #[test]
    fn test_fallback() {
        assert!(matches!(
            DeliveryMode::resolve(&settings("", " ", "\t")),
            DeliveryMode::Fallback
        ));
    }

    #[test]
    fn test_misconfigured_lists_missing() {
        let DeliveryMode::Misconfigured { missing } =
            DeliveryMode::resolve(&settings("smtp.example.com", "", "  "))
        else {
            panic!("expected Misconfigured");
        };
        assert_eq!(missing, vec!["SMTP_USER", "SMTP_PASS"]);

        let DeliveryMode::Misconfigured { missing } =
            DeliveryMode::resolve(&settings("", "user@example.com", "secret"))
        else {
            panic!("expected Misconfigured");
        };
        assert_eq!(missing, vec!["SMTP_HOST"]);
    }

    #[test]
    fn test_is_ready() {
        assert!(DeliveryMode::resolve(&settings("h", "u", "p")).is_ready());
        assert!(!DeliveryMode::resolve(&settings("", "", "")).is_ready());
    }
}
