//! Network Module
//!
//! UDP transport and the server receive loop.
//!
//! ## Architecture
//! - One receive loop, one datagram at a time
//! - Short poll timeout so shutdown is noticed promptly
//! - Requests routed through the Dispatcher

mod server;
mod transport;

pub use server::{Server, ShutdownHandle};
pub use transport::{resolve_addr, Transport, UdpTransport};
