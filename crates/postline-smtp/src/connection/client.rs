//! Type-state SMTP client.

use std::marker::PhantomData;
use std::time::Duration;

use super::{Credentials, SmtpConfig, SmtpStream, stream};
use crate::command::{Command, DATA_TERMINATOR};
use crate::error::{Error, Result};
use crate::types::{Address, Reply, ReplyCode, Step};

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state pattern.
///
/// The client owns its stream; every method that fails consumes the client,
/// so the socket is closed as soon as an error is returned.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    timeout: Duration,
    greeting: String,
    _state: PhantomData<State>,
}

impl Client<Connected> {
    /// Connects as described by `config` and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the greeting is not 220.
    pub async fn connect(config: &SmtpConfig) -> Result<Self> {
        let stream = stream::connect(config).await?;
        Self::from_stream(stream, config.io_timeout).await
    }

    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if the server returns an error.
    pub async fn from_stream(mut stream: SmtpStream, timeout: Duration) -> Result<Self> {
        let greeting = stream.read_reply(Step::Connect, timeout).await?;
        expect_code(&greeting, &[ReplyCode::SERVICE_READY], Step::Connect)?;
        tracing::debug!(greeting = %greeting.message_text(), "Connected");

        Ok(Self {
            stream,
            timeout,
            greeting: greeting.message_text(),
            _state: PhantomData,
        })
    }

    /// Sends EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        self.say_ehlo(client_hostname, Step::Ehlo).await?;
        Ok(self)
    }

    /// Upgrades the connection to TLS using STARTTLS, then repeats EHLO.
    ///
    /// STARTTLS is issued whether or not the server advertised it; a server
    /// that does not support it answers with an error code and the session
    /// stops there.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if STARTTLS or the second EHLO is refused,
    /// and a TLS error if the handshake fails.
    pub async fn starttls(mut self, config: &SmtpConfig) -> Result<Self> {
        self.expect(Command::StartTls, &[ReplyCode::SERVICE_READY], Step::StartTls)
            .await?;

        self.stream = self.stream.upgrade_to_tls(config).await?;
        tracing::debug!("TLS established");

        self.say_ehlo(&config.client_hostname, Step::EhloAfterStartTls)
            .await?;
        Ok(self)
    }

    /// Authenticates using the LOGIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an AUTH error tagged with the sub-step that was refused.
    pub async fn auth_login(mut self, credentials: &Credentials) -> Result<Client<Authenticated>> {
        self.expect(Command::AuthLogin, &[ReplyCode::AUTH_CONTINUE], Step::AuthLogin)
            .await?;
        self.expect(
            Command::auth_response(credentials.username()),
            &[ReplyCode::AUTH_CONTINUE],
            Step::AuthUser,
        )
        .await?;
        self.expect(
            Command::auth_response(credentials.password()),
            &[ReplyCode::AUTH_SUCCESS],
            Step::AuthPass,
        )
        .await?;
        tracing::debug!(username = credentials.username(), "Authenticated");

        Ok(self.transition())
    }

    /// Starts a mail transaction without authentication (if server allows).
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(mut self, from: Address) -> Result<Client<MailTransaction>> {
        self.send_mail_from(from).await?;
        Ok(self.transition())
    }

    async fn say_ehlo(&mut self, client_hostname: &str, step: Step) -> Result<()> {
        let cmd = Command::Ehlo {
            hostname: client_hostname.to_string(),
        };
        let reply = self.expect(cmd, &[ReplyCode::OK], step).await?;
        tracing::debug!(%step, capabilities = ?reply.message.get(1..), "EHLO accepted");
        Ok(())
    }
}

impl Client<Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(mut self, from: Address) -> Result<Client<MailTransaction>> {
        self.send_mail_from(from).await?;
        Ok(self.transition())
    }
}

impl Client<MailTransaction> {
    /// Adds the recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<RecipientAdded>> {
        self.expect(
            Command::RcptTo { to },
            &[ReplyCode::OK, ReplyCode::FORWARD],
            Step::RcptTo,
        )
        .await?;
        Ok(self.transition())
    }
}

impl Client<RecipientAdded> {
    /// Begins sending message data.
    ///
    /// # Errors
    ///
    /// Returns an error if the DATA command fails.
    pub async fn data(mut self) -> Result<Client<Data>> {
        self.expect(Command::Data, &[ReplyCode::START_DATA], Step::Data)
            .await?;
        Ok(self.transition())
    }
}

impl Client<Data> {
    /// Sends the framed message and the end-of-data marker in one write.
    ///
    /// `payload` must already be dot-stuffed with CRLF line endings; the
    /// terminator `\r\n.\r\n` is appended here.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or the server does not accept
    /// the message with 250.
    pub async fn send_message(mut self, payload: &[u8]) -> Result<Client<Connected>> {
        let mut framed = Vec::with_capacity(payload.len() + DATA_TERMINATOR.len());
        framed.extend_from_slice(payload);
        framed.extend_from_slice(DATA_TERMINATOR);

        self.stream
            .write_all(&framed, Step::Payload, self.timeout)
            .await?;
        let reply = self.stream.read_reply(Step::Payload, self.timeout).await?;
        expect_code(&reply, &[ReplyCode::OK], Step::Payload)?;
        tracing::debug!(reply = %reply.message_text(), "Message accepted");

        Ok(self.transition())
    }
}

// Common implementation for all states
impl<S> Client<S> {
    /// Returns the text of the server greeting.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    async fn send_command(&mut self, cmd: Command, step: Step) -> Result<Reply> {
        tracing::debug!(%step, command = ?cmd, "C:");
        self.stream
            .write_all(&cmd.serialize(), step, self.timeout)
            .await?;
        let reply = self.stream.read_reply(step, self.timeout).await?;
        tracing::debug!(%step, code = %reply.code, "S:");
        Ok(reply)
    }

    async fn expect(&mut self, cmd: Command, expected: &[ReplyCode], step: Step) -> Result<Reply> {
        let reply = self.send_command(cmd, step).await?;
        expect_code(&reply, expected, step)?;
        Ok(reply)
    }

    async fn send_mail_from(&mut self, from: Address) -> Result<()> {
        self.expect(
            Command::MailFrom { from },
            &[ReplyCode::OK, ReplyCode::FORWARD],
            Step::MailFrom,
        )
        .await?;
        Ok(())
    }

    fn transition<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            timeout: self.timeout,
            greeting: self.greeting,
            _state: PhantomData,
        }
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let result = self
            .expect(Command::Quit, &[ReplyCode::CLOSING, ReplyCode::OK], Step::Quit)
            .await
            .map(|_| ());
        self.stream.shutdown().await;
        result
    }
}

fn expect_code(reply: &Reply, expected: &[ReplyCode], step: Step) -> Result<()> {
    if reply.is_one_of(expected) {
        return Ok(());
    }

    let text = reply.message_text();
    if step.is_auth() {
        Err(Error::Auth {
            step,
            code: reply.code,
            text,
        })
    } else {
        Err(Error::protocol(step, Some(reply.code), text))
    }
}
