//! Protocol Module
//!
//! Defines the CoAP-style wire protocol spoken between access points and
//! the server. One message per UDP datagram.
//!
//! ## Message Format
//! ```text
//! ┌─────────┬─────────┬─────────┬──────────┬────────────────────┐
//! │ Ver (2) │ Kind (2)│ TKL (4) │ Code (8) │  Message ID (16)   │
//! ├─────────┴─────────┴─────────┴──────────┴────────────────────┤
//! │                 Token (0-8 bytes, TKL long)                  │
//! ├──────────────────────────────────────────────────────────────┤
//! │                 Options (delta encoded, ascending)           │
//! ├────────────┬─────────────────────────────────────────────────┤
//! │ 0xFF       │ Payload (only when non-empty)                   │
//! └────────────┴─────────────────────────────────────────────────┘
//! ```
//!
//! ### Codes used by the store
//! - 0.01 GET  - entry request, connectivity probe
//! - 0.03 PUT  - exit notification
//! - 2.04 Changed, 2.05 Content
//! - 4.05 Method Not Allowed
//! - 5.00 Internal Server Error

mod code;
mod message;
mod codec;

pub use code::{Code, Method, MessageKind};
pub use message::{Message, MessageOption, OPTION_CONTENT_FORMAT, OPTION_URI_PATH};
pub use codec::{decode_message, encode_message, MAX_OPTION_VALUE};

/// Fixed header size: first byte + code + message id
pub const HEADER_SIZE: usize = 4;

/// The only protocol version understood
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum token length in bytes
pub const MAX_TOKEN_LEN: usize = 8;

/// Separates options from the payload
pub const PAYLOAD_MARKER: u8 = 0xFF;
