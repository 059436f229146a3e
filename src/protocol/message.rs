//! Message definitions
//!
//! A single protocol unit plus the helpers built on top of it.

use std::fmt;

use super::code::{Code, Method, MessageKind};

/// Option number carrying one URI path segment
pub const OPTION_URI_PATH: u32 = 11;

/// Option number carrying the payload content format
pub const OPTION_CONTENT_FORMAT: u32 = 12;

/// A numbered option attached to a message
///
/// Numbers may repeat (one `URI_PATH` option per segment), so options are
/// kept as an ordered list rather than a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOption {
    pub number: u32,
    pub value: Vec<u8>,
}

impl MessageOption {
    pub fn new(number: u32, value: impl Into<Vec<u8>>) -> Self {
        Self {
            number,
            value: value.into(),
        }
    }
}

/// One protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub code: Code,
    pub message_id: u16,

    /// Opaque correlation bytes, 0-8 long
    pub token: Vec<u8>,

    /// Options in wire order
    pub options: Vec<MessageOption>,

    pub payload: Vec<u8>,
}

impl Message {
    /// Create an empty message of the given kind and code
    pub fn new(kind: MessageKind, code: Code, message_id: u16) -> Self {
        Self {
            kind,
            code,
            message_id,
            token: Vec::new(),
            options: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// Create a confirmable request
    pub fn request(method: Method, message_id: u16, token: Vec<u8>) -> Self {
        let mut message = Self::new(MessageKind::Confirmable, method.into(), message_id);
        message.token = token;
        message
    }

    /// Always 1; other versions are rejected by the decoder
    pub fn version(&self) -> u8 {
        super::PROTOCOL_VERSION
    }

    /// Append one option per non-empty segment of `path`
    pub fn with_uri_path(mut self, path: &str) -> Self {
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            self.options
                .push(MessageOption::new(OPTION_URI_PATH, segment.as_bytes()));
        }
        self
    }

    /// Append `segment` verbatim as a single path option
    pub fn with_raw_path_segment(mut self, segment: &str) -> Self {
        self.options
            .push(MessageOption::new(OPTION_URI_PATH, segment.as_bytes()));
        self
    }

    pub fn with_option(mut self, number: u32, value: Vec<u8>) -> Self {
        self.options.push(MessageOption::new(number, value));
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Build the piggybacked acknowledgement answering this request
    pub fn create_response(&self, code: Code, payload: impl Into<Vec<u8>>) -> Message {
        Message {
            kind: MessageKind::Acknowledgement,
            code,
            message_id: self.message_id,
            token: self.token.clone(),
            options: Vec::new(),
            payload: payload.into(),
        }
    }

    /// Values of all options with the given number, in order
    pub fn option_values(&self, number: u32) -> impl Iterator<Item = &[u8]> {
        self.options
            .iter()
            .filter(move |opt| opt.number == number)
            .map(|opt| opt.value.as_slice())
    }

    /// Reconstruct the slash-delimited URI path from the path options
    ///
    /// Segments that are not valid UTF-8 are rendered as a hex placeholder.
    pub fn uri_path(&self) -> String {
        self.option_values(OPTION_URI_PATH)
            .map(segment_text)
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Payload as text, if it is valid UTF-8
    pub fn payload_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

fn segment_text(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<{}>", hex(value)),
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}], {}, Token: {}, Path: {}, Payload: ",
            self.kind,
            self.message_id,
            self.code,
            hex(&self.token),
            self.uri_path()
        )?;
        match self.payload_text() {
            Some(text) => write!(f, "{:?}", text),
            None => write!(f, "<{} bytes>", self.payload.len()),
        }
    }
}
