//! Incremental frame encoder and decoder.
//!
//! The wire grammar is driven by one-byte type tags: `i<decimal>e` for
//! integers, `<length>:<bytes>` for text, `l…e` for lists, and `d…e` for
//! messages (key/value pairs with keys in canonical byte order). Text
//! payloads carry an explicit byte length, so embedded delimiters never
//! cause ambiguity.
//!
//! Decoding distinguishes two failure modes. Running out of bytes in the
//! middle of an otherwise well-formed value means "need more input" and is
//! reported as `Ok(None)`; the caller retries once another socket read
//! arrives. Malformed syntax — an unknown tag, a non-numeric length, a
//! payload that is not UTF-8 — is a [`DecodeError`] and is fatal to the
//! stream that produced it.

use std::str;

use thiserror::Error;

use crate::value::{Fields, Value};

/// Upper bound on a single declared text payload.
///
/// A length prefix above this limit can never be satisfied by waiting for
/// more input and is rejected as malformed instead.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Fatal framing faults raised while decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Leading byte of a value is not a known type tag.
    #[error("unrecognised type tag 0x{tag:02x} at byte {offset}")]
    UnknownTag { tag: u8, offset: usize },

    /// Integer literal is empty, non-numeric, or out of range.
    #[error("malformed integer literal at byte {offset}")]
    MalformedInteger { offset: usize },

    /// Length prefix is non-numeric or out of range.
    #[error("malformed length prefix at byte {offset}")]
    MalformedLength { offset: usize },

    /// Declared payload length exceeds [`MAX_PAYLOAD_BYTES`].
    #[error("declared payload of {declared} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { declared: usize, limit: usize },

    /// Text payload bytes are not valid UTF-8.
    #[error("text payload at byte {offset} is not valid UTF-8")]
    InvalidText { offset: usize },

    /// Message key decoded to something other than text.
    #[error("message key at byte {offset} is not text")]
    NonTextKey { offset: usize },

    /// Message declared the same key twice.
    #[error("duplicate message key '{key}'")]
    DuplicateKey { key: String },
}

/// Encodes a value into a fresh frame.
#[must_use]
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

/// Encodes a value onto the end of an existing buffer.
pub fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Int(number) => {
            out.push(b'i');
            out.extend_from_slice(number.to_string().as_bytes());
            out.push(b'e');
        }
        Value::Str(text) => encode_text(text, out),
        Value::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        Value::Map(fields) => {
            out.push(b'd');
            for (key, field) in fields {
                encode_text(key, out);
                encode_into(field, out);
            }
            out.push(b'e');
        }
    }
}

fn encode_text(text: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(text.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(text.as_bytes());
}

/// Decodes one value from the front of `input`.
///
/// Returns the value and the number of bytes consumed, or `Ok(None)` when
/// `input` holds only a prefix of a value and more bytes are needed.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the input is malformed in a way more
/// input cannot repair.
pub fn decode(input: &[u8]) -> Result<Option<(Value, usize)>, DecodeError> {
    decode_from(input, 0)
}

/// Decodes every complete value in `input`, returning the unconsumed tail.
///
/// The tail must be prepended to the next chunk of bytes read from the
/// stream; [`FrameBuffer`] does exactly that bookkeeping.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the input is malformed.
pub fn decode_all(input: &[u8]) -> Result<(Vec<Value>, Vec<u8>), DecodeError> {
    let mut values = Vec::new();
    let mut pos = 0;
    while let Some((value, next)) = decode_from(input, pos)? {
        values.push(value);
        pos = next;
    }
    Ok((values, input[pos..].to_vec()))
}

fn decode_from(input: &[u8], start: usize) -> Result<Option<(Value, usize)>, DecodeError> {
    let Some(&tag) = input.get(start) else {
        return Ok(None);
    };
    match tag {
        b'i' => decode_int(input, start),
        b'0'..=b'9' => decode_text(input, start),
        b'l' => decode_list(input, start),
        b'd' => decode_map(input, start),
        _ => Err(DecodeError::UnknownTag { tag, offset: start }),
    }
}

fn decode_int(input: &[u8], start: usize) -> Result<Option<(Value, usize)>, DecodeError> {
    let literal_start = start + 1;
    let mut pos = literal_start;
    if input.get(pos) == Some(&b'-') {
        pos += 1;
    }
    let digits_start = pos;
    while let Some(&byte) = input.get(pos) {
        if byte.is_ascii_digit() {
            pos += 1;
            continue;
        }
        if byte == b'e' && pos > digits_start {
            let literal = str::from_utf8(&input[literal_start..pos])
                .map_err(|_| DecodeError::MalformedInteger { offset: literal_start })?;
            let number: i64 = literal
                .parse()
                .map_err(|_| DecodeError::MalformedInteger { offset: literal_start })?;
            return Ok(Some((Value::Int(number), pos + 1)));
        }
        return Err(DecodeError::MalformedInteger { offset: pos });
    }
    Ok(None)
}

fn decode_text(input: &[u8], start: usize) -> Result<Option<(Value, usize)>, DecodeError> {
    let mut pos = start;
    while let Some(&byte) = input.get(pos) {
        if byte.is_ascii_digit() {
            pos += 1;
            continue;
        }
        if byte != b':' {
            return Err(DecodeError::MalformedLength { offset: pos });
        }
        let declared: usize = str::from_utf8(&input[start..pos])
            .ok()
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| DecodeError::MalformedLength { offset: start })?;
        if declared > MAX_PAYLOAD_BYTES {
            return Err(DecodeError::PayloadTooLarge {
                declared,
                limit: MAX_PAYLOAD_BYTES,
            });
        }
        let body_start = pos + 1;
        let body_end = body_start + declared;
        if input.len() < body_end {
            return Ok(None);
        }
        let text = str::from_utf8(&input[body_start..body_end])
            .map_err(|_| DecodeError::InvalidText { offset: body_start })?;
        return Ok(Some((Value::Str(text.to_owned()), body_end)));
    }
    Ok(None)
}

fn decode_list(input: &[u8], start: usize) -> Result<Option<(Value, usize)>, DecodeError> {
    let mut items = Vec::new();
    let mut pos = start + 1;
    loop {
        match input.get(pos) {
            None => return Ok(None),
            Some(&b'e') => return Ok(Some((Value::List(items), pos + 1))),
            Some(_) => {
                let Some((item, next)) = decode_from(input, pos)? else {
                    return Ok(None);
                };
                items.push(item);
                pos = next;
            }
        }
    }
}

fn decode_map(input: &[u8], start: usize) -> Result<Option<(Value, usize)>, DecodeError> {
    let mut fields = Fields::new();
    let mut pos = start + 1;
    loop {
        match input.get(pos) {
            None => return Ok(None),
            Some(&b'e') => return Ok(Some((Value::Map(fields), pos + 1))),
            Some(_) => {
                let key_offset = pos;
                let Some((key, after_key)) = decode_from(input, pos)? else {
                    return Ok(None);
                };
                let Value::Str(key) = key else {
                    return Err(DecodeError::NonTextKey { offset: key_offset });
                };
                let Some((field, after_field)) = decode_from(input, after_key)? else {
                    return Ok(None);
                };
                if fields.insert(key.clone(), field).is_some() {
                    return Err(DecodeError::DuplicateKey { key });
                }
                pos = after_field;
            }
        }
    }
}

/// Per-connection carry buffer for bytes between socket reads.
///
/// One buffer is owned by one connection handler; the undecoded tail of
/// each read is retained and tried again once the next chunk arrives.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one socket read to the buffer.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Decodes every complete frame currently buffered.
    ///
    /// The unconsumed tail stays in the buffer for the next call.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the buffered bytes are malformed; the
    /// buffer contents are unspecified afterwards and the owning stream
    /// should be dropped.
    pub fn drain(&mut self) -> Result<Vec<Value>, DecodeError> {
        let (values, remainder) = decode_all(&self.pending)?;
        self.pending = remainder;
        Ok(values)
    }

    /// Number of undecoded bytes currently held.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
