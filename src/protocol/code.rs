//! Message kinds and codes
//!
//! The code byte is split into a 3-bit class and a 5-bit detail
//! (`class.detail`, e.g. 2.05 = 69). Class 0 carries request methods.

use std::fmt;

/// Reliability intent of a message (2 bits on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Confirmable = 0,
    NonConfirmable = 1,
    Acknowledgement = 2,
    Reset = 3,
}

impl MessageKind {
    /// Build from the two kind bits; higher bits are ignored
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => MessageKind::Confirmable,
            1 => MessageKind::NonConfirmable,
            2 => MessageKind::Acknowledgement,
            _ => MessageKind::Reset,
        }
    }

    /// Short log label
    pub fn label(self) -> &'static str {
        match self {
            MessageKind::Confirmable => "CON",
            MessageKind::NonConfirmable => "NON",
            MessageKind::Acknowledgement => "ACK",
            MessageKind::Reset => "RST",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Request methods (class 0 codes 1-4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Method {
    Get = 1,
    Post = 2,
    Put = 3,
    Delete = 4,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Method> for Code {
    fn from(method: Method) -> Self {
        Code(method as u8)
    }
}

/// Raw message code
///
/// Kept as a newtype so codes outside the named table still survive a
/// decode/encode round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Code(pub u8);

impl Code {
    pub const EMPTY: Code = Code(0);

    // Requests
    pub const GET: Code = Code(1);
    pub const POST: Code = Code(2);
    pub const PUT: Code = Code(3);
    pub const DELETE: Code = Code(4);

    // 2.xx Success
    pub const CREATED: Code = Code(65);
    pub const DELETED: Code = Code(66);
    pub const VALID: Code = Code(67);
    pub const CHANGED: Code = Code(68);
    pub const CONTENT: Code = Code(69);

    // 4.xx Client error
    pub const NOT_FOUND: Code = Code(132);
    pub const METHOD_NOT_ALLOWED: Code = Code(133);

    // 5.xx Server error
    pub const INTERNAL_SERVER_ERROR: Code = Code(160);

    /// Build from `class.detail` notation
    pub const fn new(class: u8, detail: u8) -> Self {
        Code(((class & 0x07) << 5) | (detail & 0x1F))
    }

    pub fn class(self) -> u8 {
        self.0 >> 5
    }

    pub fn detail(self) -> u8 {
        self.0 & 0x1F
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The request method, if this is a known request code
    pub fn method(self) -> Option<Method> {
        match self.0 {
            1 => Some(Method::Get),
            2 => Some(Method::Post),
            3 => Some(Method::Put),
            4 => Some(Method::Delete),
            _ => None,
        }
    }

    pub fn is_request(self) -> bool {
        self.class() == 0 && !self.is_empty()
    }

    pub fn is_success(self) -> bool {
        self.class() == 2
    }

    pub fn is_client_error(self) -> bool {
        self.class() == 4
    }

    pub fn is_server_error(self) -> bool {
        self.class() == 5
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Empty");
        }
        match self.method() {
            Some(method) => f.write_str(method.name()),
            None => write!(f, "{}.{:02}", self.class(), self.detail()),
        }
    }
}
