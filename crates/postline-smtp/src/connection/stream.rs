//! Low-level SMTP stream handling.

use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    client::TlsStream,
    rustls::{ClientConfig, RootCertStore},
};

use super::{Security, SmtpConfig};
use crate::error::{Error, Result};
use crate::parser::read_reply;
use crate::types::{Reply, Step};

/// SMTP stream (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
}

impl SmtpStream {
    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Reads one complete reply, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a timeout, I/O or protocol error tagged with `step`.
    pub async fn read_reply(&mut self, step: Step, timeout: Duration) -> Result<Reply> {
        let read = async {
            match self {
                Self::Tcp(reader) => read_reply(reader, step).await,
                Self::Tls(reader) => read_reply(reader.as_mut(), step).await,
            }
        };

        tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| Error::Timeout { step })?
    }

    /// Writes data to the stream and flushes it, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a timeout or I/O error tagged with `step`.
    pub async fn write_all(&mut self, data: &[u8], step: Step, timeout: Duration) -> Result<()> {
        let write = async {
            match self {
                Self::Tcp(reader) => {
                    reader.get_mut().write_all(data).await?;
                    reader.get_mut().flush().await
                }
                Self::Tls(reader) => {
                    reader.get_mut().write_all(data).await?;
                    reader.get_mut().flush().await
                }
            }
        };

        tokio::time::timeout(timeout, write)
            .await
            .map_err(|_| Error::Timeout { step })?
            .map_err(|source| Error::Io { step, source })
    }

    /// Upgrades a TCP stream to TLS after a successful STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns a TLS error if the stream is already encrypted, if the server
    /// pipelined plaintext after its STARTTLS reply, or if the handshake fails.
    pub async fn upgrade_to_tls(self, config: &SmtpConfig) -> Result<Self> {
        let reader = match self {
            Self::Tcp(reader) => reader,
            Self::Tls(_) => {
                return Err(Error::Tls {
                    step: Step::StartTls,
                    message: "Already using TLS".into(),
                });
            }
        };

        // Anything already buffered arrived before the handshake and cannot
        // be trusted.
        if !reader.buffer().is_empty() {
            return Err(Error::Tls {
                step: Step::StartTls,
                message: "unexpected plaintext after STARTTLS reply".into(),
            });
        }

        let tls_stream = tokio::time::timeout(
            config.io_timeout,
            handshake(reader.into_inner(), config, Step::StartTls),
        )
        .await
        .map_err(|_| Error::Tls {
            step: Step::StartTls,
            message: "handshake timed out".into(),
        })??;
        Ok(Self::Tls(Box::new(BufReader::new(tls_stream))))
    }

    /// Shuts the stream down; errors are ignored since the peer may already
    /// have closed its side.
    pub async fn shutdown(&mut self) {
        let _ = match self {
            Self::Tcp(reader) => reader.get_mut().shutdown().await,
            Self::Tls(reader) => reader.get_mut().shutdown().await,
        };
    }
}

/// Opens the connection described by `config`.
///
/// Uses plain TCP for [`Security::None`] and [`Security::StartTls`], and
/// wraps the socket in TLS right away for [`Security::Implicit`]. TCP
/// connect and the implicit handshake share the connect timeout.
///
/// # Errors
///
/// Returns a connect error if the socket cannot be opened in time, or a TLS
/// error if the implicit handshake fails.
pub async fn connect(config: &SmtpConfig) -> Result<SmtpStream> {
    let open = async {
        let addr = format!("{}:{}", config.host, config.port);
        let tcp_stream = TcpStream::connect(&addr).await.map_err(Error::Connect)?;

        match config.security {
            Security::Implicit => {
                let tls_stream = handshake(tcp_stream, config, Step::Connect).await?;
                Ok(SmtpStream::Tls(Box::new(BufReader::new(tls_stream))))
            }
            Security::StartTls | Security::None => Ok(SmtpStream::Tcp(BufReader::new(tcp_stream))),
        }
    };

    tokio::time::timeout(config.connect_timeout, open)
        .await
        .map_err(|_| Error::Timeout {
            step: Step::Connect,
        })?
}

async fn handshake(
    tcp_stream: TcpStream,
    config: &SmtpConfig,
    step: Step,
) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(config.host.clone()).map_err(|_| Error::Tls {
        step,
        message: format!("Invalid hostname: {}", config.host),
    })?;

    let connector = config
        .tls
        .clone()
        .map_or_else(create_tls_connector, TlsConnector::from);

    connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| Error::Tls {
            step,
            message: e.to_string(),
        })
}

/// Creates a TLS connector with the webpki root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
