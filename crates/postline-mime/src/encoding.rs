//! Header encoding utilities.
//!
//! Supports Base64 and the RFC 2047 "B" encoded-word form used for
//! non-ASCII header values.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Longest encoded word allowed by RFC 2047.
const MAX_ENCODED_WORD: usize = 75;

/// Separator between encoded words of one folded header value.
pub const FOLD: &str = "\r\n ";

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Returns true if `text` cannot be sent as a bare header value.
///
/// Non-ASCII text, control characters and anything that looks like the
/// start of an encoded word all need encoding.
#[must_use]
pub fn needs_encoding(text: &str) -> bool {
    text.chars().any(|c| !c.is_ascii() || c.is_ascii_control()) || text.contains("=?")
}

/// Encodes `text` as a sequence of RFC 2047 "B" encoded words.
///
/// Each word stays within 75 characters and is cut on a character
/// boundary, so every word decodes to valid UTF-8 on its own. Empty input
/// yields no words.
#[must_use]
pub fn encode_words(text: &str, charset: &str) -> Vec<String> {
    // "=?" charset "?B?" ... "?="
    let overhead = charset.len() + 7;
    let max_bytes = (MAX_ENCODED_WORD.saturating_sub(overhead) / 4 * 3).max(4);

    let mut words = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (idx, ch) in text.char_indices() {
        let next = idx + ch.len_utf8();
        if next - start > max_bytes && end > start {
            words.push(encoded_word(&text[start..end], charset));
            start = end;
        }
        end = next;
    }
    if end > start {
        words.push(encoded_word(&text[start..end], charset));
    }
    words
}

fn encoded_word(chunk: &str, charset: &str) -> String {
    format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes()))
}
