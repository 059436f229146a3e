//! Dispatcher Module
//!
//! Routes decoded requests to the store handlers and builds the response.
//!
//! ## Routes
//! - GET `entry` → try to admit a customer (`allowed` / `denied`)
//! - PUT `exit`  → record a customer leaving (`success` / `error`)
//! - GET / PUT on any other path → diagnostic reply (connectivity probe)
//! - Any other method → 4.05 Method Not Allowed
//!
//! The dispatcher holds no per-request state; the only shared state is the
//! [`CapacityLedger`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::RouteMatching;
use crate::error::GateError;
use crate::ledger::CapacityLedger;
use crate::protocol::{Code, Message, Method};

/// Path segment of the entry resource
pub const ENTRY_PATH: &str = "entry";

/// Path segment of the exit resource
pub const EXIT_PATH: &str = "exit";

/// Path of the connectivity probe resource
pub const DEBUG_PATH: &str = "debug";

/// Application payloads
pub mod payload {
    pub const ALLOWED: &str = "allowed";
    pub const DENIED: &str = "denied";
    pub const SUCCESS: &str = "success";
    pub const ERROR: &str = "error";
    pub const DEBUG_GET: &str = "Debug response";
    pub const DEBUG_PUT: &str = "Debug PUT response";
}

/// Custom request handler
pub type Handler = Arc<dyn Fn(&Message) -> Message + Send + Sync>;

/// What a matched route does
#[derive(Clone)]
pub enum RouteAction {
    Entry,
    Exit,
    Custom(Handler),
}

impl fmt::Debug for RouteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteAction::Entry => f.write_str("Entry"),
            RouteAction::Exit => f.write_str("Exit"),
            RouteAction::Custom(_) => f.write_str("Custom"),
        }
    }
}

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    path: String,
    action: RouteAction,
}

/// Fixed table of (method, path) → action
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    matching: RouteMatching,
}

impl RouteTable {
    /// Table holding the entry and exit routes
    pub fn new(matching: RouteMatching) -> Self {
        let mut table = Self {
            routes: Vec::new(),
            matching,
        };
        table.add(Method::Get, ENTRY_PATH, RouteAction::Entry);
        table.add(Method::Put, EXIT_PATH, RouteAction::Exit);
        table
    }

    /// Append a route; earlier routes win
    pub fn add(&mut self, method: Method, path: &str, action: RouteAction) {
        self.routes.push(Route {
            method,
            path: normalize_path(path),
            action,
        });
    }

    pub fn matching(&self) -> RouteMatching {
        self.matching
    }

    /// Find the action for a request path
    pub fn resolve(&self, method: Method, path: &str) -> Option<&RouteAction> {
        let candidate = match self.matching {
            RouteMatching::Exact => normalize_path(path),
            RouteMatching::Legacy => path.to_lowercase(),
        };

        self.routes
            .iter()
            .filter(|route| route.method == method)
            .find(|route| match self.matching {
                RouteMatching::Exact => route.path == candidate,
                RouteMatching::Legacy => candidate.contains(&route.path),
            })
            .map(|route| &route.action)
    }
}

/// Drop empty segments so `/entry/`, `entry` and `//entry` are the same path
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Server-side request router
pub struct Dispatcher {
    ledger: Arc<CapacityLedger>,
    routes: RouteTable,
}

impl Dispatcher {
    pub fn new(ledger: Arc<CapacityLedger>, matching: RouteMatching) -> Self {
        Self {
            ledger,
            routes: RouteTable::new(matching),
        }
    }

    /// Register an additional route handled by `handler`
    pub fn route<F>(&mut self, method: Method, path: &str, handler: F)
    where
        F: Fn(&Message) -> Message + Send + Sync + 'static,
    {
        self.routes
            .add(method, path, RouteAction::Custom(Arc::new(handler)));
    }

    pub fn ledger(&self) -> &Arc<CapacityLedger> {
        &self.ledger
    }

    /// Produce the response for a decoded request
    ///
    /// Never panics: a failing handler yields 5.00 with a short diagnostic.
    pub fn dispatch(&self, request: &Message) -> Message {
        match panic::catch_unwind(AssertUnwindSafe(|| self.handle(request))) {
            Ok(response) => response,
            Err(cause) => {
                let err = GateError::Handler(panic_message(cause.as_ref()));
                tracing::error!("Request [{}] failed: {}", request.message_id, err);
                request.create_response(Code::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }

    fn handle(&self, request: &Message) -> Message {
        let path = request.uri_path();
        tracing::debug!("Processing {} request for URI: {:?}", request.code, path);

        let method = match request.code.method() {
            Some(method @ (Method::Get | Method::Put)) => method,
            _ => {
                tracing::info!("Unsupported method {}", request.code);
                return request.create_response(Code::METHOD_NOT_ALLOWED, "");
            }
        };

        match self.routes.resolve(method, &path) {
            Some(RouteAction::Entry) => self.handle_entry(request),
            Some(RouteAction::Exit) => self.handle_exit(request),
            Some(RouteAction::Custom(handler)) => handler(request),
            None if method == Method::Get => {
                tracing::info!("Sending debug response");
                request.create_response(Code::CONTENT, payload::DEBUG_GET)
            }
            None => {
                tracing::info!("Sending debug PUT response");
                request.create_response(Code::CHANGED, payload::DEBUG_PUT)
            }
        }
    }

    fn handle_entry(&self, request: &Message) -> Message {
        let body = if self.ledger.try_enter() {
            tracing::info!("Entry allowed - customer added to store");
            payload::ALLOWED
        } else {
            tracing::info!("Entry denied - store at capacity");
            payload::DENIED
        };
        self.log_stats();
        request.create_response(Code::CONTENT, body)
    }

    fn handle_exit(&self, request: &Message) -> Message {
        let body = if self.ledger.try_leave() {
            tracing::info!("Customer successfully removed from store");
            payload::SUCCESS
        } else {
            tracing::info!("Error: no customers to remove from store");
            payload::ERROR
        };
        self.log_stats();
        request.create_response(Code::CHANGED, body)
    }

    fn log_stats(&self) {
        let stats = self.ledger.snapshot();
        tracing::info!(
            total_entrants = stats.total_entrants,
            customers_in_store = stats.customers_in_store,
            remaining = stats.remaining(),
            "\n{}",
            stats
        );
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
