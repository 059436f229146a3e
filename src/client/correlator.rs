//! Request Correlator
//!
//! Sends one request at a time over the shared transport and waits, up to a
//! deadline, for the response carrying the same token.
//!
//! ## Concurrency
//! The transport sits behind a `parking_lot::Mutex`. The lock is held from
//! the first send until the exchange (including the exit retry) finishes, so
//! the entry and exit workers never interleave on the wire. A response that
//! arrives after its deadline is read by the next exchange and ignored as
//! unmatched.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;

use crate::config::Config;
use crate::dispatcher::{payload, DEBUG_PATH, ENTRY_PATH, EXIT_PATH};
use crate::error::{GateError, Result};
use crate::network::{Transport, UdpTransport};
use crate::protocol::{decode_message, encode_message, Message, MessageKind, Method};

/// Body of every exit notification
pub const EXIT_BODY: &str = "customer_exit";

/// Token length used for outgoing requests
const TOKEN_LEN: usize = 4;

/// Outcome of an entry request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDecision {
    /// Server answered `allowed`
    Allowed,
    /// Server answered anything else
    Denied,
    /// No matching response before the deadline
    NoResponse,
}

impl EntryDecision {
    /// Only the exact `allowed` payload grants access
    pub fn from_payload(body: &[u8]) -> Self {
        if body == payload::ALLOWED.as_bytes() {
            EntryDecision::Allowed
        } else {
            EntryDecision::Denied
        }
    }
}

/// Outcome of an exit notification (informational only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Server answered `success`
    Recorded,
    /// Server answered anything else (`error` on an empty store)
    Rejected,
    /// Neither the first attempt nor the retry got an answer
    NoResponse,
}

/// Client side of the request/response exchange
pub struct Correlator<T: Transport = UdpTransport> {
    transport: Mutex<T>,
    server: SocketAddr,
    next_message_id: AtomicU16,
    entry_timeout: Duration,
    exit_timeout: Duration,
    probe_wait: Duration,
    poll_slice: Duration,
    recv_buffer_size: usize,
}

impl<T: Transport> Correlator<T> {
    pub fn new(transport: T, server: SocketAddr, config: &Config) -> Self {
        Self {
            transport: Mutex::new(transport),
            server,
            next_message_id: AtomicU16::new(rand::thread_rng().gen()),
            entry_timeout: config.entry_timeout(),
            exit_timeout: config.exit_timeout(),
            probe_wait: config.probe_wait(),
            poll_slice: config.response_poll(),
            recv_buffer_size: config.recv_buffer_size,
        }
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Build a confirmable request with a fresh message id and token
    pub fn new_request(&self, method: Method) -> Message {
        let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        let mut token = [0u8; TOKEN_LEN];
        rand::thread_rng().fill(&mut token);
        Message::request(method, message_id, token.to_vec())
    }

    /// Ask whether a customer may enter
    pub fn request_entry(&self) -> EntryDecision {
        let request = self.new_request(Method::Get).with_uri_path(ENTRY_PATH);
        let transport = self.transport.lock();

        match self.exchange_locked(&*transport, &request, self.entry_timeout) {
            Ok(response) => {
                let decision = EntryDecision::from_payload(&response.payload);
                tracing::info!("Entry response {:?} -> {:?}", response.payload_text(), decision);
                decision
            }
            Err(e) => {
                tracing::warn!("Entry request failed: {}", e);
                EntryDecision::NoResponse
            }
        }
    }

    /// Tell the server a customer left
    ///
    /// On timeout the notification is sent once more with the path as a
    /// single raw `/exit` segment, for servers that expect a leading slash.
    pub fn notify_exit(&self) -> ExitOutcome {
        let transport = self.transport.lock();

        let first = self
            .new_request(Method::Put)
            .with_uri_path(EXIT_PATH)
            .with_payload(EXIT_BODY);
        let response = match self.exchange_locked(&*transport, &first, self.exit_timeout) {
            Err(GateError::NoResponse { .. }) => {
                tracing::info!("No response from server, retrying with alternative path format");
                let retry = self
                    .new_request(Method::Put)
                    .with_raw_path_segment(&format!("/{}", EXIT_PATH))
                    .with_payload(EXIT_BODY);
                self.exchange_locked(&*transport, &retry, self.exit_timeout)
            }
            other => other,
        };

        match response {
            Ok(response) if response.payload == payload::SUCCESS.as_bytes() => {
                tracing::info!("Exit recorded by server");
                ExitOutcome::Recorded
            }
            Ok(response) => {
                tracing::info!("Exit rejected by server: {:?}", response.payload_text());
                ExitOutcome::Rejected
            }
            Err(e) => {
                tracing::warn!("Exit notification failed: {}", e);
                ExitOutcome::NoResponse
            }
        }
    }

    /// GET the debug resource to check the server is reachable
    pub fn probe(&self) -> bool {
        let request = self.new_request(Method::Get).with_uri_path(DEBUG_PATH);
        let transport = self.transport.lock();

        match self.exchange_locked(&*transport, &request, self.probe_wait) {
            Ok(response) => {
                tracing::info!("Server reachable at {}: {}", self.server, response);
                true
            }
            Err(e) => {
                tracing::warn!("Connectivity probe to {} failed: {}", self.server, e);
                false
            }
        }
    }

    /// Send `request` and wait up to `timeout` for its response
    pub fn exchange(&self, request: &Message, timeout: Duration) -> Result<Message> {
        let transport = self.transport.lock();
        self.exchange_locked(&*transport, request, timeout)
    }

    fn exchange_locked(&self, transport: &T, request: &Message, timeout: Duration) -> Result<Message> {
        let bytes = encode_message(request)?;
        let started = Instant::now();
        let deadline = started + timeout;

        transport.send_to(&bytes, self.server)?;
        tracing::debug!("Sent request to {}: {}", self.server, request);

        let limit = self.recv_buffer_size;
        let mut buf = vec![0u8; limit + 1];
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(GateError::NoResponse {
                    path: request.uri_path(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }

            let wait = (deadline - now).min(self.poll_slice);
            let Some((len, peer)) = transport.recv_from(&mut buf, wait)? else {
                continue;
            };
            if len > limit {
                tracing::warn!("Ignoring oversized datagram from {} ({} byte limit)", peer, limit);
                continue;
            }

            match decode_message(&buf[..len]) {
                Ok(message) if is_response_to(&message, request) => {
                    tracing::debug!("Response received from {}: {}", peer, message);
                    return Ok(message);
                }
                Ok(message) => {
                    tracing::debug!("Ignoring unmatched message from {}: {}", peer, message);
                }
                Err(e) => {
                    tracing::debug!("Ignoring undecodable datagram from {}: {}", peer, e);
                }
            }
        }
    }
}

/// Whether `response` answers `request`
///
/// Token equality decides when the request carries a token; otherwise the
/// response must be an acknowledgement with the same message id.
pub fn is_response_to(response: &Message, request: &Message) -> bool {
    if response.code.is_request() {
        return false;
    }
    if !request.token.is_empty() {
        return response.token == request.token;
    }
    response.kind == MessageKind::Acknowledgement && response.message_id == request.message_id
}
