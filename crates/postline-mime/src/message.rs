//! Outbound message composition.

use chrono::{DateTime, FixedOffset, Local};
use postline_smtp::Address;

use crate::encoding::{encode_words, needs_encoding};
use crate::error::{Error, Result};
use crate::header::{Headers, sanitize};

/// Display name used when the configured one is empty.
pub const DEFAULT_FROM_NAME: &str = "Postline";

/// Charset declared for every body and encoded header.
pub const CHARSET: &str = "UTF-8";

/// Body content kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyKind {
    /// `text/plain`.
    #[default]
    PlainText,
    /// `text/html`.
    Html,
}

impl BodyKind {
    /// Returns the `Content-Type` header value.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::PlainText => "text/plain; charset=UTF-8",
            Self::Html => "text/html; charset=UTF-8",
        }
    }
}

/// When the Subject header is RFC 2047 encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubjectEncoding {
    /// Only if it contains non-ASCII or encoding-sensitive characters.
    #[default]
    WhenNeeded,
    /// Always, even for plain ASCII.
    Always,
}

/// A single-recipient message ready to be framed for SMTP or sendmail.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    from_name: String,
    from: Address,
    to: Address,
    reply_to: Option<Address>,
    subject: String,
    body: String,
    kind: BodyKind,
    subject_encoding: SubjectEncoding,
    date: DateTime<FixedOffset>,
}

impl OutboundMessage {
    /// Starts building a message.
    #[must_use]
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    /// Envelope and header sender.
    #[must_use]
    pub const fn from(&self) -> &Address {
        &self.from
    }

    /// Envelope and header recipient.
    #[must_use]
    pub const fn to(&self) -> &Address {
        &self.to
    }

    /// Sender display name as written in the `From` header.
    #[must_use]
    pub fn from_name(&self) -> &str {
        &self.from_name
    }

    /// Subject before encoding.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Body as given.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Body content kind.
    #[must_use]
    pub const fn kind(&self) -> BodyKind {
        self.kind
    }

    /// Builds the header block.
    ///
    /// Order: `Date`, `From`, `To`, `Reply-To` (if set), `Subject`,
    /// `MIME-Version`, `Content-Type`, `Content-Transfer-Encoding`.
    #[must_use]
    pub fn headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.add("Date", &self.date.to_rfc2822());

        headers.add(
            "From",
            &format!("{} <{}>", display_name(&self.from_name), self.from),
        );
        headers.add("To", &format!("<{}>", self.to));
        if let Some(reply_to) = &self.reply_to {
            headers.add("Reply-To", reply_to.as_str());
        }

        match self.subject_encoding {
            SubjectEncoding::WhenNeeded if !needs_encoding(&self.subject) => {
                headers.add("Subject", &self.subject);
            }
            _ => headers.add_encoded("Subject", &self.subject, CHARSET),
        }

        headers.add("MIME-Version", "1.0");
        headers.add("Content-Type", self.kind.content_type());
        headers.add("Content-Transfer-Encoding", "8bit");
        headers
    }

    /// Renders the SMTP payload: CRLF headers, a blank line, and the
    /// dot-stuffed body.
    ///
    /// The end-of-data marker is not included.
    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        format!("{}\r\n\r\n{}", self.headers(), dot_stuff(&self.body)).into_bytes()
    }

    /// Renders the message for `sendmail -t -i`: LF line endings, no
    /// dot-stuffing, trailing newline.
    #[must_use]
    pub fn to_sendmail(&self) -> Vec<u8> {
        let mut out = format!(
            "{}\n\n{}",
            self.headers().render("\n"),
            normalize_newlines(&self.body)
        );
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.into_bytes()
    }
}

/// RFC 5322 specials that cannot appear in an unquoted phrase.
const PHRASE_SPECIALS: &str = "()<>[]:;@\\,.\"";

/// Renders a `From` display name: encoded words for non-ASCII text, a
/// quoted string when it contains specials, the bare name otherwise.
fn display_name(name: &str) -> String {
    if needs_encoding(name) {
        encode_words(name, CHARSET).join(" ")
    } else if name.contains(|c: char| PHRASE_SPECIALS.contains(c)) {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        name.to_string()
    }
}

/// Rewrites CRLF and lone CR as LF.
#[must_use]
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Dot-stuffs a body for the DATA phase.
///
/// Line endings are normalized, every line starting with `.` gets an extra
/// leading `.`, and lines are joined with CRLF.
#[must_use]
pub fn dot_stuff(body: &str) -> String {
    let normalized = normalize_newlines(body);
    let mut out = String::with_capacity(normalized.len() + 16);
    for (i, line) in normalized.split('\n').enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
    }
    out
}

/// Builder for [`OutboundMessage`].
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from_name: String,
    from: Option<String>,
    to: Option<String>,
    reply_to: Option<String>,
    subject: String,
    body: String,
    kind: BodyKind,
    subject_encoding: SubjectEncoding,
    date: Option<DateTime<FixedOffset>>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender address.
    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Sets the sender display name.
    #[must_use]
    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = name.into();
        self
    }

    /// Sets the recipient address.
    #[must_use]
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to = Some(address.into());
        self
    }

    /// Sets the `Reply-To` address.
    #[must_use]
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets a plain text body.
    #[must_use]
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.kind = BodyKind::PlainText;
        self
    }

    /// Sets an HTML body.
    #[must_use]
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.kind = BodyKind::Html;
        self
    }

    /// Sets the Subject encoding policy.
    #[must_use]
    pub const fn subject_encoding(mut self, policy: SubjectEncoding) -> Self {
        self.subject_encoding = policy;
        self
    }

    /// Overrides the `Date` header (defaults to now, local time).
    #[must_use]
    pub const fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Validates the addresses and builds the message.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender or recipient is missing, or any
    /// address is malformed.
    pub fn build(self) -> Result<OutboundMessage> {
        let from = parse_address("from", self.from.ok_or(Error::MissingSender)?)?;
        let to = parse_address("to", self.to.ok_or(Error::MissingRecipient)?)?;
        let reply_to = self
            .reply_to
            .map(|addr| parse_address("reply-to", addr))
            .transpose()?;

        let from_name = match sanitize(&self.from_name) {
            name if name.is_empty() => DEFAULT_FROM_NAME.to_string(),
            name => name,
        };

        Ok(OutboundMessage {
            from_name,
            from,
            to,
            reply_to,
            subject: sanitize(&self.subject),
            body: self.body,
            kind: self.kind,
            subject_encoding: self.subject_encoding,
            date: self.date.unwrap_or_else(|| Local::now().fixed_offset()),
        })
    }
}

fn parse_address(field: &'static str, value: String) -> Result<Address> {
    Address::new(value.trim()).map_err(|source| Error::InvalidAddress { field, source })
}
