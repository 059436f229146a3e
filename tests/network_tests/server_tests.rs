//! Server Tests
//!
//! Runs the real UDP receive loop on 127.0.0.1 and talks to it with a plain
//! socket and with the client correlator.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use storegate::client::{Correlator, EntryDecision, ExitOutcome};
use storegate::dispatcher::payload;
use storegate::network::{Server, ShutdownHandle, UdpTransport};
use storegate::protocol::{decode_message, encode_message, Code, Message, Method};
use storegate::{CapacityLedger, Config, Dispatcher, RouteMatching};

// =============================================================================
// Helper Functions
// =============================================================================

struct RunningServer {
    addr: SocketAddr,
    ledger: Arc<CapacityLedger>,
    shutdown: ShutdownHandle,
    handle: JoinHandle<storegate::Result<()>>,
}

impl RunningServer {
    fn stop(self) {
        self.shutdown.shutdown();
        self.handle.join().unwrap().unwrap();
    }
}

fn test_config(capacity: usize) -> Config {
    Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_capacity(capacity)
        .recv_poll_ms(20)
        .entry_timeout_ms(2000)
        .exit_timeout_ms(1000)
        .response_poll_ms(50)
        .probe_wait_ms(1000)
        .build()
}

fn start_server(capacity: usize) -> RunningServer {
    start_server_with(test_config(capacity))
}

fn start_server_with(config: Config) -> RunningServer {
    let ledger = Arc::new(CapacityLedger::new(config.max_capacity));
    let server = Server::bind(config, Arc::clone(&ledger)).unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();
    let handle = thread::spawn(move || server.run());

    RunningServer {
        addr,
        ledger,
        shutdown,
        handle,
    }
}

fn client_socket() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    socket
}

fn send_and_receive(socket: &UdpSocket, server: SocketAddr, request: &Message) -> Message {
    socket
        .send_to(&encode_message(request).unwrap(), server)
        .unwrap();
    let mut buf = [0u8; 1024];
    let (len, _) = socket.recv_from(&mut buf).unwrap();
    decode_message(&buf[..len]).unwrap()
}

// =============================================================================
// Raw Socket Tests
// =============================================================================

#[test]
fn test_entry_over_udp() {
    let server = start_server(1);
    let socket = client_socket();

    let request = Message::request(Method::Get, 100, vec![0x01]).with_uri_path("entry");
    let response = send_and_receive(&socket, server.addr, &request);
    assert_eq!(response.code, Code::CONTENT);
    assert_eq!(response.message_id, 100);
    assert_eq!(response.payload, payload::ALLOWED.as_bytes());

    let request = Message::request(Method::Get, 101, vec![0x02]).with_uri_path("entry");
    let response = send_and_receive(&socket, server.addr, &request);
    assert_eq!(response.payload, payload::DENIED.as_bytes());

    assert_eq!(server.ledger.snapshot().customers_in_store, 1);
    server.stop();
}

#[test]
fn test_malformed_datagram_is_dropped() {
    let server = start_server(3);
    let socket = client_socket();

    // version 2, then token length 9: both dropped without a reply
    socket.send_to(&[0x80, 0x01, 0x00, 0x01], server.addr).unwrap();
    socket.send_to(&[0x49, 0x01, 0x00, 0x01], server.addr).unwrap();
    socket.send_to(&[0x40], server.addr).unwrap();

    // the next valid request gets the first reply
    let request = Message::request(Method::Put, 7, vec![0x07]).with_uri_path("exit");
    let response = send_and_receive(&socket, server.addr, &request);
    assert_eq!(response.message_id, 7);
    assert_eq!(response.payload, payload::ERROR.as_bytes());

    server.stop();
}

#[test]
fn test_handle_datagram_directly() {
    let ledger = Arc::new(CapacityLedger::new(1));
    let server = Server::bind(test_config(1), Arc::clone(&ledger)).unwrap();
    let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();

    assert!(server.handle_datagram(&[0x40, 0x01], peer).is_none());

    let request = Message::request(Method::Get, 5, vec![]).with_uri_path("entry");
    let reply = server
        .handle_datagram(&encode_message(&request).unwrap(), peer)
        .unwrap();
    let response = decode_message(&reply).unwrap();
    assert_eq!(response.payload, payload::ALLOWED.as_bytes());
    assert_eq!(ledger.snapshot().total_entrants, 1);
}

#[test]
fn test_unencodable_response_becomes_internal_error() {
    let mut dispatcher = Dispatcher::new(Arc::new(CapacityLedger::new(1)), RouteMatching::Exact);
    dispatcher.route(Method::Get, "big", |request| {
        let mut response = request.create_response(Code::CONTENT, "ok");
        response.token = vec![0; 9];
        response
    });
    let transport = UdpTransport::bind("127.0.0.1:0").unwrap();
    let server = Server::with_transport(test_config(1), dispatcher, transport);
    let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();

    let request = Message::request(Method::Get, 31, vec![0x05]).with_uri_path("big");
    let reply = server
        .handle_datagram(&encode_message(&request).unwrap(), peer)
        .unwrap();
    let response = decode_message(&reply).unwrap();

    assert_eq!(response.code, Code::INTERNAL_SERVER_ERROR);
    assert_eq!(response.message_id, 31);
    assert_eq!(response.token, vec![0x05]);
    let text = response.payload_text().unwrap();
    assert!(text.starts_with("Handler failure"), "payload was {:?}", text);
}

#[test]
fn test_oversized_datagram_is_dropped() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_capacity(3)
        .recv_poll_ms(20)
        .recv_buffer_size(32)
        .build();
    let server = start_server_with(config);
    let socket = client_socket();
    socket
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();

    // a cut-off copy of this would still decode as a valid entry request
    let request = Message::request(Method::Get, 1, vec![0x01])
        .with_uri_path("entry")
        .with_payload(vec![b'x'; 64]);
    socket
        .send_to(&encode_message(&request).unwrap(), server.addr)
        .unwrap();
    let mut buf = [0u8; 256];
    assert!(socket.recv_from(&mut buf).is_err());
    assert_eq!(server.ledger.snapshot().total_entrants, 0);

    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let request = Message::request(Method::Get, 2, vec![0x02]).with_uri_path("entry");
    let response = send_and_receive(&socket, server.addr, &request);
    assert_eq!(response.payload, payload::ALLOWED.as_bytes());

    server.stop();
}

#[test]
fn test_shutdown_stops_loop_promptly() {
    let server = start_server(1);
    let started = Instant::now();
    server.stop();
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_bind_rejects_invalid_config() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_capacity(0)
        .build();
    let result = Server::bind(config, Arc::new(CapacityLedger::new(0)));
    assert!(matches!(result, Err(storegate::GateError::Config(_))));
}

// =============================================================================
// End-to-End Tests
// =============================================================================

#[test]
fn test_correlator_against_server() {
    let server = start_server(1);
    let config = test_config(1);
    let transport = UdpTransport::bind("127.0.0.1:0").unwrap();
    let correlator = Correlator::new(transport, server.addr, &config);

    assert!(correlator.probe());
    assert_eq!(correlator.request_entry(), EntryDecision::Allowed);
    assert_eq!(correlator.request_entry(), EntryDecision::Denied);
    assert_eq!(correlator.notify_exit(), ExitOutcome::Recorded);
    assert_eq!(correlator.notify_exit(), ExitOutcome::Rejected);

    let stats = server.ledger.snapshot();
    assert_eq!(stats.total_entrants, 1);
    assert_eq!(stats.customers_in_store, 0);
    server.stop();
}

#[test]
fn test_two_access_points_share_capacity() {
    let server = start_server(3);
    let config = test_config(3);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let config = config.clone();
            let addr = server.addr;
            thread::spawn(move || {
                let transport = UdpTransport::bind("127.0.0.1:0").unwrap();
                let correlator = Correlator::new(transport, addr, &config);
                (0..4)
                    .filter(|_| correlator.request_entry() == EntryDecision::Allowed)
                    .count()
            })
        })
        .collect();

    let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(allowed, 3);
    assert_eq!(server.ledger.snapshot().customers_in_store, 3);
    server.stop();
}
