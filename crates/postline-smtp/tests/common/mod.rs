//! Scripted SMTP server for the integration tests.
//!
//! The server sends a greeting, then for every scripted action reads one
//! command line (or the whole payload after a 354) and answers. Whatever the
//! client sends after the script has run out is still recorded until it
//! closes the connection.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

/// Object-safe bundle of the traits the fixture needs from a stream.
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

/// One scripted server turn.
#[derive(Debug, Clone, Copy)]
pub enum Action {
    /// Read a command, answer with this reply (lines separated by CRLF).
    Reply(&'static str),
    /// Read STARTTLS, answer, then run the server side of the handshake.
    StartTls(&'static str),
    /// Read STARTTLS, answer, then send garbage instead of a handshake.
    BreakTls(&'static str),
}

/// Everything the client sent.
#[derive(Debug, Default)]
pub struct Transcript {
    /// Command lines without CRLF.
    pub commands: Vec<String>,
    /// Bytes received after the DATA reply, terminator included.
    pub payload: Option<Vec<u8>>,
    /// Raw bytes received after a deliberately broken STARTTLS.
    pub raw_after_break: Vec<u8>,
}

impl Transcript {
    /// Returns true if any command starts with `prefix`.
    pub fn sent(&self, prefix: &str) -> bool {
        self.commands.iter().any(|c| c.starts_with(prefix))
    }
}

/// Running fixture server.
pub struct Fixture {
    /// Listening address.
    pub addr: SocketAddr,
    handle: JoinHandle<Transcript>,
}

/// TLS material for one test: server acceptor and a client config trusting it.
pub struct TestTls {
    /// Server side.
    pub acceptor: TlsAcceptor,
    /// Client side, trusting only the self-signed certificate.
    pub client_config: Arc<rustls::ClientConfig>,
}

impl TestTls {
    /// Generates a self-signed certificate for 127.0.0.1.
    pub fn new() -> Self {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()]).unwrap();
        let cert_der = cert.der().clone();
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

        let server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der.clone()], key_der)
            .unwrap();

        let mut roots = rustls::RootCertStore::empty();
        roots.add(cert_der).unwrap();
        let client_config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Self {
            acceptor: TlsAcceptor::from(Arc::new(server_config)),
            client_config: Arc::new(client_config),
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("postline_smtp=debug")
        .with_test_writer()
        .try_init();
}

impl Fixture {
    /// Starts a plaintext fixture (STARTTLS actions need `tls`).
    pub async fn start(greeting: &'static str, script: Vec<Action>, tls: Option<TlsAcceptor>) -> Self {
        Self::spawn(greeting, script, tls, false).await
    }

    /// Starts a fixture that expects TLS from the first byte.
    pub async fn start_implicit(greeting: &'static str, script: Vec<Action>, tls: TlsAcceptor) -> Self {
        Self::spawn(greeting, script, Some(tls), true).await
    }

    /// Starts a server that accepts the connection but never says anything.
    pub async fn silent() -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut tcp, _) = listener.accept().await.unwrap();
            let mut sink = Vec::new();
            let _ = tcp.read_to_end(&mut sink).await;
            Transcript::default()
        });
        Self { addr, handle }
    }

    async fn spawn(
        greeting: &'static str,
        script: Vec<Action>,
        tls: Option<TlsAcceptor>,
        implicit: bool,
    ) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(serve(listener, greeting, script, tls, implicit));
        Self { addr, handle }
    }

    /// Waits for the client to disconnect and returns what it sent.
    pub async fn transcript(self) -> Transcript {
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("fixture did not finish")
            .expect("fixture panicked")
    }
}

async fn serve(
    listener: TcpListener,
    greeting: &'static str,
    script: Vec<Action>,
    tls: Option<TlsAcceptor>,
    implicit: bool,
) -> Transcript {
    let mut transcript = Transcript::default();
    let (tcp, _) = listener.accept().await.unwrap();

    let io: Box<dyn Io> = if implicit {
        let acceptor = tls.clone().expect("implicit TLS needs an acceptor");
        Box::new(acceptor.accept(tcp).await.unwrap())
    } else {
        Box::new(tcp)
    };
    let mut reader = BufReader::new(io);
    reply(&mut reader, greeting).await;

    let mut in_data = false;
    for action in script {
        if in_data {
            let Some(payload) = read_payload(&mut reader).await else {
                return transcript;
            };
            transcript.payload = Some(payload);
            in_data = false;
        } else {
            let Some(line) = read_command(&mut reader).await else {
                return transcript;
            };
            transcript.commands.push(line);
        }

        match action {
            Action::Reply(text) => {
                reply(&mut reader, text).await;
                in_data = text.starts_with("354");
            }
            Action::StartTls(text) => {
                reply(&mut reader, text).await;
                let acceptor = tls.clone().expect("STARTTLS needs an acceptor");
                let tls_stream = acceptor.accept(reader.into_inner()).await.unwrap();
                let io: Box<dyn Io> = Box::new(tls_stream);
                reader = BufReader::new(io);
            }
            Action::BreakTls(text) => {
                reply(&mut reader, text).await;
                let mut io = reader.into_inner();
                let _ = io.write_all(b"this is not a TLS record\r\n").await;
                let _ = io.flush().await;
                let _ = tokio::time::timeout(
                    Duration::from_secs(5),
                    io.read_to_end(&mut transcript.raw_after_break),
                )
                .await;
                return transcript;
            }
        }
    }

    // Record anything the client sends after the script ends.
    while let Ok(Some(line)) =
        tokio::time::timeout(Duration::from_secs(5), read_command(&mut reader)).await
    {
        transcript.commands.push(line);
    }
    transcript
}

async fn reply(stream: &mut BufReader<Box<dyn Io>>, text: &str) {
    let _ = stream.write_all(format!("{text}\r\n").as_bytes()).await;
    let _ = stream.flush().await;
}

async fn read_command(stream: &mut BufReader<Box<dyn Io>>) -> Option<String> {
    let mut line = String::new();
    match stream.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

async fn read_payload(stream: &mut BufReader<Box<dyn Io>>) -> Option<Vec<u8>> {
    let mut payload = Vec::new();
    loop {
        match stream.read_until(b'\n', &mut payload).await {
            Ok(0) | Err(_) => return None,
            Ok(_) if payload.ends_with(b"\r\n.\r\n") => return Some(payload),
            Ok(_) => {}
        }
    }
}

/// Returns true if `needle` occurs anywhere in `haystack`.
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
