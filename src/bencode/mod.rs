//! Bencode codec for torrent metainfo and tracker responses.
//!
//! Bencode has four data types: integers, byte strings, lists, and
//! dictionaries. Decoding is a single left-to-right pass over the input;
//! the decoder also records the raw byte span of the value stored under an
//! `info` dictionary key so callers can hash the original bytes verbatim.

mod decoder;
mod value;

use std::ops::Range;

use decoder::Decoder;
pub use value::{Dictionary, Value};

/// Errors produced while decoding malformed Bencode input.
#[derive(Debug, thiserror::Error)]
pub enum BencodeError {
    #[error("unexpected end of input at byte {pos}")]
    UnexpectedEnd { pos: usize },

    #[error("invalid token {byte:#04x} at byte {pos}")]
    InvalidToken { byte: u8, pos: usize },

    #[error("invalid byte string length at byte {pos}")]
    InvalidLength { pos: usize },

    #[error("unterminated integer at byte {pos}")]
    UnterminatedInteger { pos: usize },

    #[error("invalid integer at byte {pos}")]
    InvalidInteger { pos: usize },
}

/// Decodes a single Bencode value from the front of `bytes`.
///
/// Trailing bytes after the first complete value are ignored.
///
/// # Errors
///
/// - `BencodeError` - If the input is truncated or structurally malformed
pub fn decode(bytes: &[u8]) -> Result<Value, BencodeError> {
    Decoder::new(bytes).decode().map(|(value, _)| value)
}

/// Decodes a value and reports the raw byte span of the `info` entry.
///
/// The span covers exactly the bytes consumed for the value stored under an
/// `info` dictionary key, so the caller can slice the original buffer for
/// hashing instead of re-encoding (re-encoding is not guaranteed to be
/// byte-identical for input from other implementations).
///
/// # Errors
///
/// - `BencodeError` - If the input is truncated or structurally malformed
pub fn decode_with_info_span(bytes: &[u8]) -> Result<(Value, Option<Range<usize>>), BencodeError> {
    Decoder::new(bytes).decode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let value = decode(b"i7etrailing").unwrap();
        assert_eq!(value, Value::Integer(7));
    }

    #[test]
    fn test_info_span_slices_original_bytes() {
        let bytes = b"d8:announce4:http4:infod6:lengthi5eee";
        let (_, span) = decode_with_info_span(bytes).unwrap();
        let span = span.unwrap();
        assert_eq!(&bytes[span], b"d6:lengthi5ee");
    }

    #[test]
    fn test_info_span_absent_without_info_key() {
        let (_, span) = decode_with_info_span(b"d3:foo3:bare").unwrap();
        assert!(span.is_none());
    }
}
