//! UDP Server
//!
//! Single receive loop: one datagram at a time is decoded, dispatched and
//! answered before the next one is read.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{GateError, Result};
use crate::ledger::CapacityLedger;
use crate::protocol::{decode_message, encode_message, Code, Message};

use super::transport::{Transport, UdpTransport};

/// Cloneable handle that stops a running server
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the receive loop to exit after its current poll
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Store access server
pub struct Server<T: Transport = UdpTransport> {
    config: Config,
    dispatcher: Dispatcher,
    transport: T,
    shutdown: ShutdownHandle,
}

impl Server<UdpTransport> {
    /// Bind the configured UDP address
    pub fn bind(config: Config, ledger: Arc<CapacityLedger>) -> Result<Self> {
        config.validate()?;
        let transport = UdpTransport::bind(config.listen_addr.as_str())?;
        let dispatcher = Dispatcher::new(ledger, config.route_matching);
        Ok(Self::with_transport(config, dispatcher, transport))
    }
}

impl<T: Transport> Server<T> {
    pub fn with_transport(config: Config, dispatcher: Dispatcher, transport: T) -> Self {
        Self {
            config,
            dispatcher,
            transport,
            shutdown: ShutdownHandle::new(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Run the receive loop until shutdown (blocking)
    ///
    /// Only socket-level receive errors end the loop with an error.
    pub fn run(&self) -> Result<()> {
        let local = self.transport.local_addr()?;
        tracing::info!("Server listening on udp://{}", local);

        // one spare byte reveals datagrams the OS had to truncate
        let limit = self.config.recv_buffer_size;
        let mut buf = vec![0u8; limit + 1];
        let poll = self.config.recv_poll();

        while !self.shutdown.is_shutdown() {
            let (len, peer) = match self.transport.recv_from(&mut buf, poll)? {
                Some(received) => received,
                None => continue,
            };
            tracing::trace!("Received {} bytes from {}", len, peer);

            if len > limit {
                tracing::warn!(
                    "Dropping datagram from {}: larger than the {} byte receive buffer",
                    peer,
                    limit
                );
                continue;
            }

            let Some(reply) = self.handle_datagram(&buf[..len], peer) else {
                continue;
            };

            if let Err(e) = self.transport.send_to(&reply, peer) {
                tracing::warn!("Error sending response to {}: {}", peer, e);
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Turn one datagram into the encoded reply, if any
    ///
    /// Undecodable datagrams are logged and dropped without a reply.
    pub fn handle_datagram(&self, datagram: &[u8], peer: SocketAddr) -> Option<Bytes> {
        let request = match decode_message(datagram) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Dropping datagram from {}: {}", peer, e);
                return None;
            }
        };
        tracing::info!("Received message from {}: {}", peer, request);

        let response = self.dispatcher.dispatch(&request);
        tracing::info!("Sending response: {}", response);

        match encode_message(&response) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!("Failed to encode response for {}: {}", peer, e);
                self.encode_fallback(&request, &e.to_string())
            }
        }
    }

    /// 5.00 reply for a response that cannot be put on the wire
    fn encode_fallback(&self, request: &Message, reason: &str) -> Option<Bytes> {
        let err = GateError::Handler(format!("response not encodable: {}", reason));
        let fallback = request.create_response(Code::INTERNAL_SERVER_ERROR, err.to_string());
        match encode_message(&fallback) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!("Dropping reply to [{}]: {}", request.message_id, e);
                None
            }
        }
    }
}
