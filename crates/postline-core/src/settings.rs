//! Mail settings.
//!
//! Settings come from the process environment, from any lookup function
//! (handy in tests), or from a JSON file. Missing values fall back to the
//! defaults below.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use postline_smtp::{Address, Security};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sender used when neither `SMTP_FROM_EMAIL` nor `SMTP_USER` is an address.
pub const FALLBACK_SENDER: &str = "no-reply@example.com";

/// Shortest allowed network timeout.
pub const MIN_TIMEOUT_SECS: u64 = 5;

const DEFAULT_PORT: u16 = 587;
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_FROM_NAME: &str = "Postline";
const DEFAULT_APP_URL: &str = "http://localhost";
const DEFAULT_CLIENT_HOST: &str = "localhost";
const DEFAULT_LOG_PATH: &str = "storage/logs/mail.log";
const DEFAULT_SENDMAIL: &str = "/usr/sbin/sendmail";

/// Outbound mail configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    /// SMTP relay host (`SMTP_HOST`).
    pub host: String,
    /// SMTP port (`SMTP_PORT`).
    pub port: u16,
    /// Connection security (`SMTP_SECURE`, `SMTP_USE_SSL`, `SMTP_USE_TLS`).
    pub security: Security,
    /// AUTH username (`SMTP_USER`).
    pub username: String,
    /// AUTH password (`SMTP_PASS`).
    #[serde(skip_serializing)]
    pub password: String,
    /// Sender display name (`SMTP_FROM_NAME`).
    pub from_name: String,
    /// Sender address (`SMTP_FROM_EMAIL`).
    pub from_email: String,
    /// Name announced in EHLO (`SMTP_CLIENT_HOST`, else the `APP_URL` host).
    pub client_host: String,
    /// Connect and read timeout in seconds (`SMTP_TIMEOUT_SECONDS`).
    pub timeout_secs: u64,
    /// Failure log file (`MAIL_LOG_PATH`).
    pub log_path: PathBuf,
    /// Local submission program used when SMTP is not configured
    /// (`SENDMAIL_PATH`).
    pub sendmail_path: PathBuf,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            security: Security::StartTls,
            username: String::new(),
            password: String::new(),
            from_name: DEFAULT_FROM_NAME.to_string(),
            from_email: String::new(),
            client_host: DEFAULT_CLIENT_HOST.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            sendmail_path: PathBuf::from(DEFAULT_SENDMAIL),
        }
    }
}

impl fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_name", &self.from_name)
            .field("from_email", &self.from_email)
            .field("client_host", &self.client_host)
            .field("timeout_secs", &self.timeout_secs)
            .field("log_path", &self.log_path)
            .field("sendmail_path", &self.sendmail_path)
            .finish()
    }
}

impl MailSettings {
    /// Reads settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its
    /// value.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).unwrap_or_default();

        let port = match lookup("SMTP_PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Ignoring invalid SMTP_PORT");
                defaults.port
            }),
            None => defaults.port,
        };

        let timeout_secs = lookup("SMTP_TIMEOUT_SECONDS")
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(defaults.timeout_secs);

        Self {
            host: get("SMTP_HOST").trim().to_string(),
            port,
            security: resolve_security(&lookup),
            username: get("SMTP_USER").trim().to_string(),
            password: get("SMTP_PASS"),
            from_name: lookup("SMTP_FROM_NAME").unwrap_or(defaults.from_name),
            from_email: get("SMTP_FROM_EMAIL"),
            client_host: resolve_client_host(&lookup),
            timeout_secs,
            log_path: lookup("MAIL_LOG_PATH")
                .filter(|p| !p.trim().is_empty())
                .map_or(defaults.log_path, PathBuf::from),
            sendmail_path: lookup("SENDMAIL_PATH")
                .filter(|p| !p.trim().is_empty())
                .map_or(defaults.sendmail_path, PathBuf::from),
        }
    }

    /// Loads settings from a JSON file. Absent keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// sets port 0.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        if settings.port == 0 {
            return Err(Error::Config("port must not be 0".into()));
        }
        Ok(settings)
    }

    /// Network timeout, never shorter than five seconds.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(MIN_TIMEOUT_SECS))
    }

    /// Envelope sender: `from_email`, else the username when it is an
    /// address, else [`FALLBACK_SENDER`].
    #[must_use]
    pub fn sender(&self) -> String {
        [&self.from_email, &self.username]
            .into_iter()
            .find_map(|candidate| normalize_address(candidate))
            .unwrap_or_else(|| FALLBACK_SENDER.to_string())
    }

    /// Name announced in `EHLO`: `client_host` when it is a single token,
    /// else `localhost`.
    #[must_use]
    pub fn ehlo_host(&self) -> String {
        ehlo_name(&self.client_host).unwrap_or_else(|| DEFAULT_CLIENT_HOST.to_string())
    }
}

/// Trims `raw` and accepts it only if it has no whitespace or control
/// characters, since it ends up on the `EHLO` command line.
fn ehlo_name(raw: &str) -> Option<String> {
    let host = raw.trim();
    let valid = !host.is_empty() && !host.chars().any(|c| c.is_whitespace() || c.is_control());
    valid.then(|| host.to_string())
}

/// Trims and lowercases `raw`, returning it only if it is a valid address.
#[must_use]
pub fn normalize_address(raw: &str) -> Option<String> {
    let normalized = raw.trim().to_lowercase();
    Address::new(normalized.as_str()).ok().map(|_| normalized)
}

/// Parses a boolean flag: `1`, `true`, `yes` and `on` are true.
fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn resolve_security<F>(lookup: &F) -> Security
where
    F: Fn(&str) -> Option<String>,
{
    let flag = |key: &str, default: bool| lookup(key).map_or(default, |raw| parse_flag(&raw));

    if let Some(explicit) = lookup("SMTP_SECURE").and_then(|raw| raw.parse().ok()) {
        return explicit;
    }
    if flag("SMTP_USE_SSL", false) {
        Security::Implicit
    } else if flag("SMTP_USE_TLS", true) {
        Security::StartTls
    } else {
        Security::None
    }
}

fn resolve_client_host<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("SMTP_CLIENT_HOST").and_then(|raw| ehlo_name(&raw)) {
        return host;
    }

    let app_url = lookup("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string());
    url::Url::parse(app_url.trim())
        .ok()
        .and_then(|url| url.host_str().and_then(ehlo_name))
        .unwrap_or_else(|| DEFAULT_CLIENT_HOST.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> MailSettings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        MailSettings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]);
        assert_eq!(s.host, "");
        assert_eq!(s.port, 587);
        assert_eq!(s.security, Security::StartTls);
        assert_eq!(s.from_name, "Postline");
        assert_eq!(s.client_host, "localhost");
        assert_eq!(s.timeout(), Duration::from_secs(15));
        assert_eq!(s.log_path, PathBuf::from("storage/logs/mail.log"));
        assert_eq!(s.sendmail_path, PathBuf::from("/usr/sbin/sendmail"));
        assert_eq!(s, MailSettings::default());
    }

    #[test]
    fn test_values_are_trimmed() {
        let s = settings(&[
            ("SMTP_HOST", "  smtp.example.com "),
            ("SMTP_USER", " user@example.com "),
            ("SMTP_PASS", " pa ss "),
        ]);
        assert_eq!(s.host, "smtp.example.com");
        assert_eq!(s.username, "user@example.com");
        // Passwords are used verbatim.
        assert_eq!(s.password, " pa ss ");
    }

    #[test]
    fn test_explicit_secure_wins() {
        let s = settings(&[("SMTP_SECURE", "SSL"), ("SMTP_USE_TLS", "true")]);
        assert_eq!(s.security, Security::Implicit);

        let s = settings(&[("SMTP_SECURE", "none"), ("SMTP_USE_SSL", "1")]);
        assert_eq!(s.security, Security::None);
    }

    #[test]
    fn test_security_flags() {
        assert_eq!(
            settings(&[("SMTP_USE_SSL", "yes")]).security,
            Security::Implicit
        );
        assert_eq!(
            settings(&[("SMTP_USE_TLS", "off")]).security,
            Security::None
        );
        assert_eq!(
            settings(&[("SMTP_SECURE", "bogus"), ("SMTP_USE_TLS", "ON")]).security,
            Security::StartTls
        );
    }

    #[test]
    fn test_invalid_port_uses_default() {
        assert_eq!(settings(&[("SMTP_PORT", "465")]).port, 465);
        assert_eq!(settings(&[("SMTP_PORT", "smtp")]).port, 587);
    }

    #[test]
    fn test_timeout_floor() {
        assert_eq!(
            settings(&[("SMTP_TIMEOUT_SECONDS", "1")]).timeout(),
            Duration::from_secs(5)
        );
        assert_eq!(
            settings(&[("SMTP_TIMEOUT_SECONDS", "30")]).timeout(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_client_host_resolution() {
        assert_eq!(
            settings(&[("SMTP_CLIENT_HOST", "mx.app.test"), ("APP_URL", "https://app.test")])
                .client_host,
            "mx.app.test"
        );
        assert_eq!(
            settings(&[("APP_URL", "https://app.test:8443/path")]).client_host,
            "app.test"
        );
        assert_eq!(settings(&[("APP_URL", "not a url")]).client_host, "localhost");
    }

    #[test]
    fn test_client_host_with_line_breaks_is_ignored() {
        let s = settings(&[
            ("SMTP_CLIENT_HOST", "evil.test\r\nMAIL FROM:<x@evil.test>"),
            ("APP_URL", "https://app.test"),
        ]);
        assert_eq!(s.client_host, "app.test");

        let loaded = MailSettings {
            client_host: "evil.test\r\nRSET".to_string(),
            ..MailSettings::default()
        };
        assert_eq!(loaded.ehlo_host(), "localhost");
        assert_eq!(settings(&[("SMTP_CLIENT_HOST", " mx.app.test ")]).ehlo_host(), "mx.app.test");
    }

    #[test]
    fn test_sender_resolution() {
        let s = settings(&[("SMTP_FROM_EMAIL", " Sender@Example.com ")]);
        assert_eq!(s.sender(), "sender@example.com");

        let s = settings(&[("SMTP_FROM_EMAIL", "nope"), ("SMTP_USER", "relay@example.com")]);
        assert_eq!(s.sender(), "relay@example.com");

        let s = settings(&[("SMTP_USER", "apikey")]);
        assert_eq!(s.sender(), FALLBACK_SENDER);
    }

    #[test]
    fn test_debug_redacts_password() {
        let s = settings(&[("SMTP_PASS", "hunter2")]);
        let debug = format!("{s:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail.json");
        std::fs::write(
            &path,
            r#"{"host": "smtp.example.com", "security": "ssl", "port": 465, "username": "u@example.com", "password": "p"}"#,
        )
        .unwrap();

        let s = MailSettings::from_file(&path).unwrap();
        assert_eq!(s.host, "smtp.example.com");
        assert_eq!(s.security, Security::Implicit);
        assert_eq!(s.port, 465);
        assert_eq!(s.password, "p");
        assert_eq!(s.from_name, "Postline");
    }

    #[test]
    fn test_from_file_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            MailSettings::from_file(&path),
            Err(crate::Error::Serde(_))
        ));
    }

    #[test]
    fn test_from_file_rejects_port_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail.json");
        std::fs::write(&path, r#"{"host": "smtp.example.com", "port": 0}"#).unwrap();

        assert!(matches!(
            MailSettings::from_file(&path),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_serialized_settings_omit_password() {
        let s = settings(&[("SMTP_PASS", "hunter2")]);
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
