//! Session configuration types.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on connect and on every reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Security {
    /// No encryption (port 25). **Not recommended for production.**
    #[cfg_attr(feature = "serde", serde(rename = "none"))]
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 587).
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "tls", alias = "starttls"))]
    StartTls,
    /// TLS from the start (port 465).
    #[cfg_attr(feature = "serde", serde(rename = "ssl", alias = "implicit"))]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }

    /// Returns the configuration keyword (`none`, `tls` or `ssl`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::StartTls => "tls",
            Self::Implicit => "ssl",
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a security keyword is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown security mode {0:?} (expected none, tls or ssl)")]
pub struct UnknownSecurity(pub String);

impl FromStr for Security {
    type Err = UnknownSecurity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "tls" | "starttls" => Ok(Self::StartTls),
            "ssl" | "implicit" => Ok(Self::Implicit),
            other => Err(UnknownSecurity(other.to_string())),
        }
    }
}

/// Username and password for AUTH LOGIN.
///
/// Held together so a half-configured pair cannot reach the session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SMTP session configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Server hostname, also used for TLS server name verification.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// AUTH LOGIN credentials; AUTH is skipped when absent.
    pub credentials: Option<Credentials>,
    /// Bound on TCP connect and the implicit TLS handshake.
    pub connect_timeout: Duration,
    /// Bound on every reply read.
    pub io_timeout: Duration,
    /// Hostname announced in EHLO.
    pub client_hostname: String,
    /// TLS client configuration; webpki roots are used when absent.
    pub tls: Option<Arc<rustls::ClientConfig>>,
}

impl SmtpConfig {
    /// Creates a new configuration using STARTTLS on port 587.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> SmtpConfigBuilder {
        SmtpConfigBuilder::new(host)
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    credentials: Option<Credentials>,
    connect_timeout: Duration,
    io_timeout: Duration,
    client_hostname: String,
    tls: Option<Arc<rustls::ClientConfig>>,
}

impl SmtpConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::StartTls,
            credentials: None,
            connect_timeout: DEFAULT_TIMEOUT,
            io_timeout: DEFAULT_TIMEOUT,
            client_hostname: "localhost".to_string(),
            tls: None,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the AUTH LOGIN credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets both the connect and the I/O timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.io_timeout = timeout;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the hostname announced in EHLO.
    #[must_use]
    pub fn client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }

    /// Uses a custom TLS client configuration (e.g. private roots).
    #[must_use]
    pub fn tls_config(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        self.tls = Some(config);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SmtpConfig {
        SmtpConfig {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            credentials: self.credentials,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            client_hostname: self.client_hostname,
            tls: self.tls,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Implicit.default_port(), 465);
    }

    #[test]
    fn test_security_keywords() {
        assert_eq!("tls".parse::<Security>().unwrap(), Security::StartTls);
        assert_eq!(" SSL ".parse::<Security>().unwrap(), Security::Implicit);
        assert_eq!("none".parse::<Security>().unwrap(), Security::None);
        assert!("maybe".parse::<Security>().is_err());
        assert_eq!(Security::Implicit.to_string(), "ssl");
    }

    #[test]
    fn test_config_new() {
        let config = SmtpConfig::new("smtp.example.com");
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.security, Security::StartTls);
        assert!(config.credentials.is_none());
        assert_eq!(config.client_hostname, "localhost");
    }

    #[test]
    fn test_config_builder() {
        let config = SmtpConfig::builder("smtp.example.com")
            .port(2525)
            .security(Security::None)
            .credentials("user", "pass")
            .timeout(Duration::from_secs(5))
            .client_hostname("app.example.com")
            .build();

        assert_eq!(config.port, 2525);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.credentials.as_ref().unwrap().username(), "user");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.io_timeout, Duration::from_secs(5));
        assert_eq!(config.client_hostname, "app.example.com");
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = SmtpConfig::builder("smtp.example.com")
            .security(Security::Implicit)
            .build();

        assert_eq!(config.port, 465);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("user", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}
