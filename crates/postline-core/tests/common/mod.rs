//! Plaintext scripted relay for service tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use postline_core::MailSettings;
use postline_smtp::Security;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What the client sent on one connection.
#[derive(Debug, Default)]
pub struct Transcript {
    /// Command lines without CRLF.
    pub commands: Vec<String>,
    /// DATA payload including the terminator.
    pub payload: Option<String>,
}

impl Transcript {
    /// Returns true if any command starts with `prefix`.
    pub fn sent(&self, prefix: &str) -> bool {
        self.commands.iter().any(|c| c.starts_with(prefix))
    }
}

/// Scripted relay answering one connection.
pub struct Relay {
    /// Listening address.
    pub addr: SocketAddr,
    handle: JoinHandle<Transcript>,
}

impl Relay {
    /// Starts a relay that greets with 220 and answers each command with the
    /// next reply.
    pub async fn start(replies: Vec<&'static str>) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("postline_core=debug,postline_smtp=debug")
            .with_test_writer()
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            serve(tcp, replies).await
        });
        Self { addr, handle }
    }

    /// Settings pointing at this relay, plaintext, with credentials.
    pub fn settings(&self) -> MailSettings {
        MailSettings {
            host: "127.0.0.1".to_string(),
            port: self.addr.port(),
            security: Security::None,
            username: "relay@example.com".to_string(),
            password: "secret".to_string(),
            from_email: "no-reply@example.com".to_string(),
            client_host: "app.test".to_string(),
            timeout_secs: 5,
            ..MailSettings::default()
        }
    }

    /// Waits for the client to hang up and returns the transcript.
    pub async fn transcript(self) -> Transcript {
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("relay did not finish")
            .expect("relay panicked")
    }
}

async fn serve(tcp: TcpStream, replies: Vec<&'static str>) -> Transcript {
    let mut transcript = Transcript::default();
    let mut stream = BufReader::new(tcp);
    write_reply(&mut stream, "220 relay.test ESMTP").await;

    let mut replies = replies.into_iter();
    loop {
        let mut line = String::new();
        match stream.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        transcript.commands.push(line);

        let Some(reply) = replies.next() else { continue };
        write_reply(&mut stream, reply).await;

        if reply.starts_with("354") {
            let mut payload = String::new();
            while !payload.ends_with("\r\n.\r\n") {
                match stream.read_line(&mut payload).await {
                    Ok(0) | Err(_) => return transcript,
                    Ok(_) => {}
                }
            }
            transcript.payload = Some(payload);
            let Some(reply) = replies.next() else { continue };
            write_reply(&mut stream, reply).await;
        }
    }
    transcript
}

async fn write_reply(stream: &mut BufReader<TcpStream>, reply: &str) {
    let _ = stream.write_all(format!("{reply}\r\n").as_bytes()).await;
    let _ = stream.flush().await;
}

/// Replies for a complete authenticated delivery.
pub fn happy_script() -> Vec<&'static str> {
    vec![
        "250-relay.test\r\n250 AUTH LOGIN",
        "334 VXNlcm5hbWU6",
        "334 UGFzc3dvcmQ6",
        "235 2.7.0 Authentication successful",
        "250 2.1.0 Ok",
        "250 2.1.5 Ok",
        "354 End data with <CR><LF>.<CR><LF>",
        "250 2.0.0 Ok: queued",
        "221 2.0.0 Bye",
    ]
}

/// Writes an executable script standing in for sendmail.
#[cfg(unix)]
pub fn fake_sendmail(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("sendmail");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
