//! # storegate
//!
//! Capacity-limited store access control:
//! - Access points ask a central server whether a customer may enter
//! - Exits are reported so the occupancy count stays accurate
//! - CoAP-style binary messages, one per UDP datagram
//! - Occupancy never drops below zero or exceeds the store capacity
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────┐          ┌──────────────────────────────┐
//! │        Access Point          │   UDP    │           Server             │
//! │  entry / exit sensor workers │ ───────► │        receive loop          │
//! │            │                 │          │            │                 │
//! │            ▼                 │          │            ▼                 │
//! │  Correlator (one in flight)  │ ◄─────── │  Codec ─► Dispatcher         │
//! │            │                 │          │            │                 │
//! │            ▼                 │          │            ▼                 │
//! │     Door Indicator           │          │     Capacity Ledger          │
//! └──────────────────────────────┘          └──────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod ledger;
pub mod dispatcher;
pub mod network;
pub mod client;
pub mod console;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DecodeError, EncodeError, GateError, Result};
pub use config::{Config, RouteMatching};
pub use ledger::{CapacityLedger, LedgerSnapshot};
pub use dispatcher::Dispatcher;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of storegate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
