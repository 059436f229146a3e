//! Dispatcher Tests
//!
//! Tests verify:
//! - Entry and exit handling against the ledger
//! - Diagnostic replies for other GET/PUT paths
//! - Method Not Allowed for other methods
//! - Exact vs legacy path matching
//! - Handler failures become 5.00 responses

use std::sync::Arc;

use storegate::dispatcher::payload;
use storegate::protocol::{Code, Message, MessageKind, Method, OPTION_URI_PATH};
use storegate::{CapacityLedger, Dispatcher, RouteMatching};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_dispatcher(capacity: usize) -> Dispatcher {
    Dispatcher::new(Arc::new(CapacityLedger::new(capacity)), RouteMatching::Exact)
}

fn entry_request(message_id: u16) -> Message {
    Message::request(Method::Get, message_id, vec![0xE0, message_id as u8]).with_uri_path("entry")
}

fn exit_request(message_id: u16) -> Message {
    Message::request(Method::Put, message_id, vec![0xE1, message_id as u8])
        .with_uri_path("exit")
        .with_payload("customer_exit")
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_allowed_then_denied_at_capacity() {
    let dispatcher = setup_dispatcher(2);

    for id in 0..2 {
        let response = dispatcher.dispatch(&entry_request(id));
        assert_eq!(response.code, Code::CONTENT);
        assert_eq!(response.payload, payload::ALLOWED.as_bytes());
    }

    let response = dispatcher.dispatch(&entry_request(2));
    assert_eq!(response.code, Code::CONTENT);
    assert_eq!(response.payload, payload::DENIED.as_bytes());

    let stats = dispatcher.ledger().snapshot();
    assert_eq!(stats.customers_in_store, 2);
    assert_eq!(stats.total_entrants, 2);
}

#[test]
fn test_response_echoes_request() {
    let dispatcher = setup_dispatcher(1);
    let request = entry_request(0x4242);

    let response = dispatcher.dispatch(&request);

    assert_eq!(response.kind, MessageKind::Acknowledgement);
    assert_eq!(response.message_id, 0x4242);
    assert_eq!(response.token, request.token);
}

// =============================================================================
// Exit Tests
// =============================================================================

#[test]
fn test_exit_success_then_error_on_empty() {
    let dispatcher = setup_dispatcher(5);
    dispatcher.dispatch(&entry_request(1));
    assert_eq!(dispatcher.ledger().snapshot().customers_in_store, 1);

    let response = dispatcher.dispatch(&exit_request(2));
    assert_eq!(response.code, Code::CHANGED);
    assert_eq!(response.payload, payload::SUCCESS.as_bytes());
    assert_eq!(dispatcher.ledger().snapshot().customers_in_store, 0);

    let response = dispatcher.dispatch(&exit_request(3));
    assert_eq!(response.code, Code::CHANGED);
    assert_eq!(response.payload, payload::ERROR.as_bytes());
    assert_eq!(dispatcher.ledger().snapshot().customers_in_store, 0);
}

#[test]
fn test_exit_with_leading_slash_segment() {
    let dispatcher = setup_dispatcher(5);
    dispatcher.dispatch(&entry_request(1));

    let request = Message::request(Method::Put, 2, vec![1])
        .with_raw_path_segment("/exit")
        .with_payload("customer_exit");
    let response = dispatcher.dispatch(&request);

    assert_eq!(response.payload, payload::SUCCESS.as_bytes());
}

// =============================================================================
// Fallback Route Tests
// =============================================================================

#[test]
fn test_get_other_path_is_debug_probe() {
    let dispatcher = setup_dispatcher(5);
    let request = Message::request(Method::Get, 1, vec![]).with_uri_path("debug");

    let response = dispatcher.dispatch(&request);

    assert_eq!(response.code, Code::CONTENT);
    assert_eq!(response.payload, payload::DEBUG_GET.as_bytes());
    assert_eq!(dispatcher.ledger().snapshot().total_entrants, 0);
}

#[test]
fn test_put_other_path_is_debug_reply() {
    let dispatcher = setup_dispatcher(5);
    let request = Message::request(Method::Put, 1, vec![]).with_uri_path("lights");

    let response = dispatcher.dispatch(&request);

    assert_eq!(response.code, Code::CHANGED);
    assert_eq!(response.payload, payload::DEBUG_PUT.as_bytes());
}

#[test]
fn test_wrong_method_for_route_falls_back() {
    let dispatcher = setup_dispatcher(5);

    // PUT entry and GET exit are not routes
    let put_entry = Message::request(Method::Put, 1, vec![]).with_uri_path("entry");
    assert_eq!(dispatcher.dispatch(&put_entry).payload, payload::DEBUG_PUT.as_bytes());

    let get_exit = Message::request(Method::Get, 2, vec![]).with_uri_path("exit");
    assert_eq!(dispatcher.dispatch(&get_exit).payload, payload::DEBUG_GET.as_bytes());

    assert_eq!(dispatcher.ledger().snapshot().total_entrants, 0);
}

#[test]
fn test_other_methods_not_allowed() {
    let dispatcher = setup_dispatcher(5);

    for method in [Method::Post, Method::Delete] {
        let request = Message::request(method, 1, vec![]).with_uri_path("entry");
        let response = dispatcher.dispatch(&request);
        assert_eq!(response.code, Code::METHOD_NOT_ALLOWED);
        assert!(response.payload.is_empty());
    }

    let empty = Message::new(MessageKind::Confirmable, Code::EMPTY, 9);
    assert_eq!(dispatcher.dispatch(&empty).code, Code::METHOD_NOT_ALLOWED);
    assert_eq!(dispatcher.ledger().snapshot().total_entrants, 0);
}

#[test]
fn test_undecodable_segment_does_not_break_routing() {
    let dispatcher = setup_dispatcher(5);
    let request = Message::request(Method::Get, 1, vec![]).with_option(OPTION_URI_PATH, vec![0xC3, 0x28]);

    let response = dispatcher.dispatch(&request);

    assert_eq!(response.code, Code::CONTENT);
    assert_eq!(response.payload, payload::DEBUG_GET.as_bytes());
}

// =============================================================================
// Matching Policy Tests
// =============================================================================

#[test]
fn test_exact_matching_rejects_partial_segments() {
    let dispatcher = setup_dispatcher(5);

    for path in ["reentry", "entry/now", "store/entry", "ENTRY"] {
        let request = Message::request(Method::Get, 1, vec![]).with_uri_path(path);
        let response = dispatcher.dispatch(&request);
        assert_eq!(response.payload, payload::DEBUG_GET.as_bytes(), "path {}", path);
    }
    assert_eq!(dispatcher.ledger().snapshot().total_entrants, 0);
}

#[test]
fn test_legacy_matching_uses_substrings() {
    let dispatcher = Dispatcher::new(Arc::new(CapacityLedger::new(5)), RouteMatching::Legacy);

    for path in ["reentry", "store/ENTRY", "entry/now"] {
        let request = Message::request(Method::Get, 1, vec![]).with_uri_path(path);
        let response = dispatcher.dispatch(&request);
        assert_eq!(response.payload, payload::ALLOWED.as_bytes(), "path {}", path);
    }

    let request = Message::request(Method::Put, 2, vec![]).with_uri_path("exits");
    assert_eq!(dispatcher.dispatch(&request).payload, payload::SUCCESS.as_bytes());
    assert_eq!(dispatcher.ledger().snapshot().customers_in_store, 2);
}

// =============================================================================
// Handler Failure Tests
// =============================================================================

#[test]
fn test_custom_route() {
    let mut dispatcher = setup_dispatcher(5);
    dispatcher.route(Method::Get, "stats", |request| {
        request.create_response(Code::CONTENT, "custom")
    });

    let request = Message::request(Method::Get, 1, vec![]).with_uri_path("stats");
    assert_eq!(dispatcher.dispatch(&request).payload, b"custom".to_vec());
}

#[test]
fn test_panicking_handler_yields_internal_error() {
    let mut dispatcher = setup_dispatcher(5);
    dispatcher.route(Method::Get, "boom", |_| panic!("sensor table missing"));

    let request = Message::request(Method::Get, 77, vec![7]).with_uri_path("boom");
    let response = dispatcher.dispatch(&request);

    assert_eq!(response.code, Code::INTERNAL_SERVER_ERROR);
    assert_eq!(response.message_id, 77);
    assert_eq!(response.token, vec![7]);
    let text = response.payload_text().unwrap();
    assert!(text.contains("sensor table missing"), "payload was {:?}", text);

    // the dispatcher keeps working afterwards
    let response = dispatcher.dispatch(&entry_request(78));
    assert_eq!(response.payload, payload::ALLOWED.as_bytes());
}
