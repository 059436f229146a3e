//! Client Module
//!
//! Access point side: request correlation, door signalling and the sensor
//! workers that tie them together.
//!
//! ## Flow
//! ```text
//! sensor trip ──► worker ──► Correlator (exclusive transport) ──► server
//!                   │                       │
//!                   └──── Indicator ◄───────┘ decision
//! ```

mod access_point;
mod correlator;
mod door;

pub use access_point::{AccessPoint, SensorEvent, SensorWorkers};
pub use correlator::{is_response_to, Correlator, EntryDecision, ExitOutcome, EXIT_BODY};
pub use door::{BlinkPattern, Door, Indicator, LogDoor};
