//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Option Header
//! ```text
//!   0   1   2   3   4   5   6   7
//! ┌───────────────┬───────────────┐
//! │  Delta (4)    │  Length (4)   │
//! ├───────────────┴───────────────┤
//! │  Delta extension (0-2 bytes)  │
//! ├───────────────────────────────┤
//! │  Length extension (0-2 bytes) │
//! ├───────────────────────────────┤
//! │  Value (Length bytes)         │
//! └───────────────────────────────┘
//! ```
//!
//! ### Nibble values
//! - 0-12: the value itself
//! - 13:   one extension byte, value = byte + 13
//! - 14:   two extension bytes (big-endian), value = u16 + 269
//! - 15:   reserved (only valid as part of the 0xFF payload marker)

use bytes::{BufMut, Bytes, BytesMut};

use super::{
    Code, Message, MessageKind, MessageOption, HEADER_SIZE, MAX_TOKEN_LEN, PAYLOAD_MARKER,
    PROTOCOL_VERSION,
};
use crate::error::{DecodeError, EncodeError};

/// Largest delta or length an option header can express
pub const MAX_OPTION_VALUE: u32 = 65804;

const ONE_BYTE_NIBBLE: u8 = 13;
const TWO_BYTE_NIBBLE: u8 = 14;
const RESERVED_NIBBLE: u8 = 15;

const ONE_BYTE_BASE: u32 = 13;
const TWO_BYTE_BASE: u32 = 269;

// =============================================================================
// Decoding
// =============================================================================

/// Bounds-checked cursor over a received datagram
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        self.pos = self.buf.len();
        rest
    }
}

/// Decode a message from a datagram
///
/// The whole buffer belongs to the message; there is no outer length prefix.
pub fn decode_message(bytes: &[u8]) -> Result<Message, DecodeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DecodeError::Truncated);
    }

    let mut reader = Reader::new(bytes);

    // Parse header
    let first = reader.u8()?;
    let version = first >> 6;
    if version != PROTOCOL_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let kind = MessageKind::from_bits(first >> 4);
    let token_len = first & 0x0F;
    if token_len as usize > MAX_TOKEN_LEN {
        return Err(DecodeError::InvalidTokenLength(token_len));
    }
    let code = Code(reader.u8()?);
    let message_id = reader.u16()?;

    let token = reader.take(token_len as usize)?.to_vec();

    // Parse options and payload
    let mut options = Vec::new();
    let mut payload = Vec::new();
    let mut number: u32 = 0;

    while !reader.is_empty() {
        let lead = reader.u8()?;
        if lead == PAYLOAD_MARKER {
            let rest = reader.rest();
            if rest.is_empty() {
                return Err(DecodeError::EmptyPayload);
            }
            payload = rest.to_vec();
            break;
        }

        let delta = read_extended(&mut reader, lead >> 4)?;
        let length = read_extended(&mut reader, lead & 0x0F)?;

        number = number.checked_add(delta).ok_or(DecodeError::InvalidOption)?;
        let value = reader.take(length as usize)?;
        options.push(MessageOption::new(number, value));
    }

    Ok(Message {
        kind,
        code,
        message_id,
        token,
        options,
        payload,
    })
}

/// Resolve a 4-bit option nibble, reading its extension bytes if any
fn read_extended(reader: &mut Reader<'_>, nibble: u8) -> Result<u32, DecodeError> {
    debug_assert!(nibble <= RESERVED_NIBBLE);
    match nibble {
        0..=12 => Ok(nibble as u32),
        ONE_BYTE_NIBBLE => Ok(reader.u8()? as u32 + ONE_BYTE_BASE),
        TWO_BYTE_NIBBLE => Ok(reader.u16()? as u32 + TWO_BYTE_BASE),
        _ => Err(DecodeError::InvalidOption),
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Extension bytes following an option header nibble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extension {
    None,
    One(u8),
    Two(u16),
}

/// Smallest nibble/extension pair for `value`, or None past the limit
fn split_extended(value: u32) -> Option<(u8, Extension)> {
    match value {
        0..=12 => Some((value as u8, Extension::None)),
        13..=268 => Some((ONE_BYTE_NIBBLE, Extension::One((value - ONE_BYTE_BASE) as u8))),
        269..=MAX_OPTION_VALUE => Some((
            TWO_BYTE_NIBBLE,
            Extension::Two((value - TWO_BYTE_BASE) as u16),
        )),
        _ => None,
    }
}

fn put_extension(buf: &mut BytesMut, ext: Extension) {
    match ext {
        Extension::None => {}
        Extension::One(b) => buf.put_u8(b),
        Extension::Two(v) => buf.put_u16(v),
    }
}

/// Encode a message to bytes
///
/// Options are written in ascending number order; options sharing a number
/// keep their relative order. The payload marker is only written when the
/// payload is non-empty.
pub fn encode_message(message: &Message) -> Result<Bytes, EncodeError> {
    let token_len = message.token.len();
    if token_len > MAX_TOKEN_LEN {
        return Err(EncodeError::TokenTooLong(token_len));
    }

    let options_len: usize = message.options.iter().map(|o| 5 + o.value.len()).sum();
    let mut buf =
        BytesMut::with_capacity(HEADER_SIZE + token_len + options_len + 1 + message.payload.len());

    // Build header
    buf.put_u8((PROTOCOL_VERSION << 6) | ((message.kind as u8) << 4) | token_len as u8);
    buf.put_u8(message.code.0);
    buf.put_u16(message.message_id);
    buf.put_slice(&message.token);

    // sort_by_key is stable
    let mut options: Vec<&MessageOption> = message.options.iter().collect();
    options.sort_by_key(|opt| opt.number);

    let mut previous: u32 = 0;
    for opt in options {
        let delta = opt.number - previous;
        previous = opt.number;

        let (delta_nibble, delta_ext) =
            split_extended(delta).ok_or(EncodeError::OptionDeltaTooLarge(delta))?;
        let value_len = opt.value.len();
        let (len_nibble, len_ext) = u32::try_from(value_len)
            .ok()
            .and_then(split_extended)
            .ok_or(EncodeError::OptionValueTooLong(value_len))?;

        buf.put_u8((delta_nibble << 4) | len_nibble);
        put_extension(&mut buf, delta_ext);
        put_extension(&mut buf, len_ext);
        buf.put_slice(&opt.value);
    }

    if !message.payload.is_empty() {
        buf.put_u8(PAYLOAD_MARKER);
        buf.put_slice(&message.payload);
    }

    Ok(buf.freeze())
}
