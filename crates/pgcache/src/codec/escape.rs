//! Percent-escaping for cache key segments.
//!
//! Only the characters that carry structure in a key are escaped: the
//! segment separator, query-string delimiters, the escape marker itself,
//! and whitespace / control bytes. Everything else (including non-ASCII
//! UTF-8) is kept verbatim so keys stay readable.

use crate::codec::DecodeError;

const fn needs_escape(byte: u8) -> bool {
    matches!(byte, b'%' | b'&' | b'=' | b'$' | b'#' | b'+') || byte <= 0x20 || byte == 0x7f
}

/// Escape one key segment or query-string component.
#[must_use]
pub(crate) fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii() && needs_escape(ch as u8) {
            use std::fmt::Write as _;
            let _ = write!(out, "%{:02X}", ch as u8);
        } else {
            out.push(ch);
        }
    }

    out
}

/// Reverse [`escape`]. Accepts upper- and lowercase hex digits.
pub(crate) fn unescape(raw: &str) -> Result<String, DecodeError> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;

    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let hi = bytes.get(idx + 1).copied().and_then(decode_hex_nibble);
            let lo = bytes.get(idx + 2).copied().and_then(decode_hex_nibble);
            let (Some(hi), Some(lo)) = (hi, lo) else {
                return Err(DecodeError::InvalidEscape { position: idx });
            };
            out.push((hi << 4) | lo);
            idx += 3;
        } else {
            out.push(bytes[idx]);
            idx += 1;
        }
    }

    String::from_utf8(out).map_err(|_| DecodeError::InvalidUtf8)
}

const fn decode_hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

///
/// TESTS
///
