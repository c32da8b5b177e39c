//! Recursive-descent Bencode decoder with explicit cursor tracking.

use std::ops::Range;

use super::{BencodeError, Dictionary, Value};

/// Single-pass decoder over a byte buffer.
///
/// The cursor is a plain index into the input so byte spans of sub-values
/// can be captured as offsets and sliced from the original buffer later.
pub(super) struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    info_span: Option<Range<usize>>,
}

impl<'a> Decoder<'a> {
    pub(super) fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            info_span: None,
        }
    }

    pub(super) fn decode(mut self) -> Result<(Value, Option<Range<usize>>), BencodeError> {
        let value = self.parse_value()?;
        Ok((value, self.info_span))
    }

    fn peek(&self) -> Result<u8, BencodeError> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEnd { pos: self.pos })
    }

    fn parse_value(&mut self) -> Result<Value, BencodeError> {
        match self.peek()? {
            b'i' => self.parse_integer(),
            b'l' => self.parse_list(),
            b'd' => self.parse_dict(),
            b'0'..=b'9' => Ok(Value::Bytes(self.parse_byte_string()?)),
            byte => Err(BencodeError::InvalidToken {
                byte,
                pos: self.pos,
            }),
        }
    }

    fn parse_integer(&mut self) -> Result<Value, BencodeError> {
        let start = self.pos;
        self.pos += 1; // 'i'
        let digits_start = self.pos;
        loop {
            match self.input.get(self.pos) {
                None => return Err(BencodeError::UnterminatedInteger { pos: start }),
                Some(b'e') => break,
                Some(_) => self.pos += 1,
            }
        }
        let digits = &self.input[digits_start..self.pos];
        let value = std::str::from_utf8(digits)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or(BencodeError::InvalidInteger { pos: start })?;
        self.pos += 1; // 'e'
        Ok(Value::Integer(value))
    }

    fn parse_byte_string(&mut self) -> Result<Vec<u8>, BencodeError> {
        let start = self.pos;
        let mut length: usize = 0;
        loop {
            match self.input.get(self.pos) {
                None => return Err(BencodeError::UnexpectedEnd { pos: self.pos }),
                Some(b':') => break,
                Some(byte @ b'0'..=b'9') => {
                    length = length
                        .checked_mul(10)
                        .and_then(|total| total.checked_add(usize::from(byte - b'0')))
                        .ok_or(BencodeError::InvalidLength { pos: start })?;
                    self.pos += 1;
                }
                Some(_) => return Err(BencodeError::InvalidLength { pos: start }),
            }
        }
        self.pos += 1; // ':'
        let end = self
            .pos
            .checked_add(length)
            .filter(|end| *end <= self.input.len())
            .ok_or(BencodeError::UnexpectedEnd { pos: self.pos })?;
        let bytes = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(bytes)
    }

    fn parse_list(&mut self) -> Result<Value, BencodeError> {
        self.pos += 1; // 'l'
        let mut items = Vec::new();
        loop {
            if self.peek()? == b'e' {
                self.pos += 1;
                return Ok(Value::List(items));
            }
            items.push(self.parse_value()?);
        }
    }

    fn parse_dict(&mut self) -> Result<Value, BencodeError> {
        self.pos += 1; // 'd'
        let mut dict = Dictionary::new();
        loop {
            match self.peek()? {
                b'e' => {
                    self.pos += 1;
                    return Ok(Value::Dict(dict));
                }
                b'0'..=b'9' => {}
                byte => {
                    return Err(BencodeError::InvalidToken {
                        byte,
                        pos: self.pos,
                    });
                }
            }
            let key_bytes = self.parse_byte_string()?;
            // Keys are treated as text; binary keys must not abort the decode
            let key = String::from_utf8_lossy(&key_bytes).into_owned();
            let value_start = self.pos;
            let value = self.parse_value()?;
            if key == "info" {
                // Outermost occurrence wins: this assignment runs after any
                // nested dictionary has already recorded its own span.
                self.info_span = Some(value_start..self.pos);
            }
            dict.insert(key, value);
        }
    }
}
