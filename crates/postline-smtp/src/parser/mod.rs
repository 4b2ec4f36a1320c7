//! SMTP response parser.
//!
//! SMTP replies can be single-line or multi-line:
//! - Single: `250 OK\r\n`
//! - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
//!
//! Each line starts with a three-digit code followed by `-` (more lines
//! follow) or a space (last line). The code of a reply is taken from its
//! last line.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode, Step};

/// Upper bound on a single reply line; RFC 5321 allows 512 octets.
const MAX_LINE_LEN: u64 = 2048;

/// Reasons a reply line or reply group is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// No lines were supplied.
    #[error("empty reply")]
    Empty,
    /// Line shorter than a reply code.
    #[error("reply too short: {0:?}")]
    TooShort(String),
    /// First three characters are not a code in 100..=599.
    #[error("invalid reply code: {0:?}")]
    InvalidCode(String),
    /// Fourth character is neither `-` nor a space.
    #[error("malformed reply line: {0:?}")]
    InvalidSeparator(String),
    /// A continuation line was the last one supplied.
    #[error("reply ended on a continuation line: {0:?}")]
    Unterminated(String),
}

/// One physical line of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyLine<'a> {
    /// Code at the start of the line.
    pub code: ReplyCode,
    /// True when the separator is a space (or the line is just the code).
    pub is_last: bool,
    /// Text after the separator.
    pub text: &'a str,
}

/// Parses a single reply line without its line terminator.
///
/// # Errors
///
/// Returns an error if the line does not start with a valid code and
/// separator.
pub fn parse_line(line: &str) -> std::result::Result<ReplyLine<'_>, ParseError> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 {
        return Err(ParseError::TooShort(line.to_string()));
    }

    if !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(ParseError::InvalidCode(line.to_string()));
    }

    let code = line[..3]
        .parse::<u16>()
        .ok()
        .and_then(ReplyCode::checked)
        .ok_or_else(|| ParseError::InvalidCode(line.to_string()))?;

    match bytes.get(3) {
        None => Ok(ReplyLine {
            code,
            is_last: true,
            text: "",
        }),
        Some(b' ') => Ok(ReplyLine {
            code,
            is_last: true,
            text: &line[4..],
        }),
        Some(b'-') => Ok(ReplyLine {
            code,
            is_last: false,
            text: &line[4..],
        }),
        Some(_) => Err(ParseError::InvalidSeparator(line.to_string())),
    }
}

/// Parses an SMTP reply from response lines.
///
/// The code is taken from the final line, which must be a last-line
/// (space-separated) reply line.
///
/// # Errors
///
/// Returns an error if the reply is malformed.
pub fn parse_reply(lines: &[String]) -> std::result::Result<Reply, ParseError> {
    let Some(last) = lines.last() else {
        return Err(ParseError::Empty);
    };

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        message.push(parse_line(line)?.text.to_string());
    }

    let final_line = parse_line(last)?;
    if !final_line.is_last {
        return Err(ParseError::Unterminated(last.clone()));
    }

    Ok(Reply::new(final_line.code, message))
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Multi-line replies use `-` separator for continuation and ` ` for the last line.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    parse_line(line).is_ok_and(|parsed| parsed.is_last)
}

/// Reads one complete reply from `reader`.
///
/// Consumes lines up to and including the first last-line, so a following
/// reply stays buffered for the next call. Blank lines are skipped.
///
/// # Errors
///
/// Returns a protocol error at `step` if the peer closes the connection
/// before a last line arrives or sends a line without a valid code, and an
/// I/O error if the read itself fails.
pub async fn read_reply<R>(reader: &mut R, step: Step) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines: Vec<String> = Vec::new();
    loop {
        let mut buf = Vec::new();
        let read = (&mut *reader)
            .take(MAX_LINE_LEN)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|source| Error::Io { step, source })?;

        if read == 0 {
            let text = if lines.is_empty() {
                "connection closed without reply".to_string()
            } else {
                format!("connection closed mid-reply: {}", lines.join(" | "))
            };
            return Err(Error::protocol(step, None, text));
        }

        if !buf.ends_with(b"\n") && read as u64 >= MAX_LINE_LEN {
            return Err(Error::protocol(step, None, "reply line too long"));
        }

        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        if line.is_empty() {
            continue;
        }

        let is_last = parse_line(&line)
            .map_err(|e| Error::protocol(step, None, e.to_string()))?
            .is_last;
        tracing::trace!(%step, line = %line, "S:");
        lines.push(line);

        if is_last {
            break;
        }
    }

    parse_reply(&lines).map_err(|e| Error::protocol(step, None, e.to_string()))
}
