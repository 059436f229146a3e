//! Operator console
//!
//! Line commands read by the server binary:
//! - `stats` - print the ledger snapshot
//! - `quit`  - stop the server
//!
//! End of input only closes the console; the server keeps running.

use std::io::{BufRead, Write};

use crate::error::Result;
use crate::ledger::CapacityLedger;
use crate::network::ShutdownHandle;

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Stats,
    Quit,
    Empty,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "stats" => ConsoleCommand::Stats,
            "quit" => ConsoleCommand::Quit,
            "" => ConsoleCommand::Empty,
            other => ConsoleCommand::Unknown(other.to_string()),
        }
    }
}

/// Why the console loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// `quit` was entered and shutdown was requested
    Quit,
    /// Input ended (detached stdin); the server was left running
    Closed,
}

/// Run console commands from `input` until `quit` or end of input
pub fn run_console<R: BufRead, W: Write>(
    input: R,
    mut output: W,
    shutdown: &ShutdownHandle,
    ledger: &CapacityLedger,
) -> Result<ConsoleExit> {
    for line in input.lines() {
        match ConsoleCommand::parse(&line?) {
            ConsoleCommand::Stats => writeln!(output, "\n{}\n", ledger.snapshot())?,
            ConsoleCommand::Quit => {
                tracing::info!("Shutdown requested from console");
                shutdown.shutdown();
                return Ok(ConsoleExit::Quit);
            }
            ConsoleCommand::Empty => {}
            ConsoleCommand::Unknown(other) => {
                writeln!(output, "unknown command '{}' (try: stats, quit)", other)?
            }
        }
    }

    tracing::info!("Console input closed; server keeps running");
    Ok(ConsoleExit::Closed)
}
