//! Door indicator
//!
//! The door itself (relay, LED, GPIO) is an external collaborator behind the
//! [`Door`] trait. [`Indicator`] serialises access to it so the entry and
//! exit workers never drive the output at the same time.

use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

/// Door actuation signal
pub trait Door: Send + Sync {
    /// Open the door (green light)
    fn open(&self);

    /// Close the door (red light)
    fn close(&self);
}

/// Door that only logs its state changes
#[derive(Debug, Default)]
pub struct LogDoor;

impl Door for LogDoor {
    fn open(&self) {
        tracing::info!("Door OPEN (green)");
    }

    fn close(&self) {
        tracing::info!("Door CLOSED (red)");
    }
}

/// Blink patterns signalling a refused entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkPattern {
    /// Server answered and refused entry
    Denied,
    /// Server did not answer
    Unreachable,
}

impl BlinkPattern {
    pub fn count(self) -> usize {
        match self {
            BlinkPattern::Denied => 3,
            BlinkPattern::Unreachable => 5,
        }
    }

    /// Half-period as a multiple of the configured blink time
    fn divisor(self) -> u32 {
        match self {
            BlinkPattern::Denied => 1,
            BlinkPattern::Unreachable => 2,
        }
    }
}

/// Serialised access to the door output
pub struct Indicator {
    door: Box<dyn Door>,
    output: Mutex<()>,
    blink: Duration,
}

impl Indicator {
    pub fn new(door: impl Door + 'static, blink: Duration) -> Self {
        Self {
            door: Box::new(door),
            output: Mutex::new(()),
            blink,
        }
    }

    pub fn open(&self) {
        let _output = self.output.lock();
        self.door.open();
    }

    pub fn close(&self) {
        let _output = self.output.lock();
        self.door.close();
    }

    /// Open, wait `dwell`, close
    pub fn hold_open(&self, dwell: Duration) {
        self.open();
        thread::sleep(dwell);
        self.close();
    }

    /// Each blink holds the output lock; the gap between blinks does not
    pub fn blink(&self, pattern: BlinkPattern) {
        let half = self.blink / pattern.divisor();
        for _ in 0..pattern.count() {
            {
                let _output = self.output.lock();
                self.door.open();
                thread::sleep(half);
                self.door.close();
            }
            thread::sleep(half);
        }
    }
}
