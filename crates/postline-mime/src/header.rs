//! Ordered header list.
//!
//! Header values are sanitized once, on insertion: CR and LF are stripped
//! and surrounding whitespace trimmed, so no caller-supplied value can
//! start a new header line.

use crate::encoding::{FOLD, encode_words};
use std::fmt;

/// Removes every CR and LF from `value` and trims it.
#[must_use]
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Headers in the order they will be written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(&'static str, String)>,
}

impl Headers {
    /// Creates a new empty header list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header with a sanitized value.
    pub fn add(&mut self, name: &'static str, value: &str) {
        self.entries.push((name, sanitize(value)));
    }

    /// Appends a header whose value is `text` as folded RFC 2047 words.
    pub fn add_encoded(&mut self, name: &'static str, text: &str, charset: &str) {
        let words = encode_words(&sanitize(text), charset);
        self.entries.push((name, words.join(FOLD)));
    }

    /// Gets the first value for a header (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns an iterator over all headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (*n, v.as_str()))
    }

    /// Number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the header block with `eol` between lines and inside folds.
    ///
    /// No line ending follows the last header.
    #[must_use]
    pub fn render(&self, eol: &str) -> String {
        self.entries
            .iter()
            .map(|(name, value)| format!("{name}: {}", value.replace("\r\n", eol)))
            .collect::<Vec<_>>()
            .join(eol)
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render("\r\n"))
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
    fn test_sanitize() {
        assert_eq!(sanitize("  Hello\r\nBcc: evil@example.com "), "HelloBcc: evil@example.com");
        assert_eq!(sanitize("\r\n"), "");
        assert_eq!(sanitize("plain"), "plain");
    }

    #[test]
    fn test_headers_keep_order() {
        let mut headers = Headers::new();
        headers.add("To", "b@example.com");
        headers.add("From", "a@example.com");
        headers.add("Subject", "Hi");

        let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["To", "From", "Subject"]);
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_headers_get_case_insensitive() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("Subject"), None);
    }

    #[test]
    fn test_headers_value_cannot_inject_lines() {
        let mut headers = Headers::new();
        headers.add("Subject", "Hi\r\nBcc: victim@example.com");

        let rendered = headers.to_string();
        assert_eq!(rendered, "Subject: HiBcc: victim@example.com");
        assert_eq!(rendered.lines().count(), 1);
    }

    #[test]
    fn test_headers_render_folded_value() {
        let mut headers = Headers::new();
        headers.add_encoded("Subject", &"é".repeat(40), "UTF-8");
        headers.add("MIME-Version", "1.0");

        let crlf = headers.to_string();
        assert!(crlf.contains("?=\r\n =?UTF-8?B?"));

        let lf = headers.render("\n");
        assert!(!lf.contains('\r'));
        assert!(lf.contains("?=\n =?UTF-8?B?"));
        assert!(lf.ends_with("\nMIME-Version: 1.0"));
    }
}
