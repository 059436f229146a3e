//! Access point workers
//!
//! Turns sensor trips into protocol exchanges and door signals. Entry and
//! exit each get their own worker thread; both share one [`Correlator`]
//! and one [`Indicator`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use crate::config::Config;
use crate::error::Result;
use crate::network::{Transport, UdpTransport};

use super::correlator::{Correlator, EntryDecision, ExitOutcome};
use super::door::{BlinkPattern, Indicator};

/// A trip of one of the door sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorEvent {
    EntryTrip,
    ExitTrip,
}

/// Sensor handling for one door
pub struct AccessPoint<T: Transport = UdpTransport> {
    correlator: Arc<Correlator<T>>,
    indicator: Arc<Indicator>,
    door_dwell: Duration,
}

impl<T: Transport + 'static> AccessPoint<T> {
    pub fn new(correlator: Arc<Correlator<T>>, indicator: Arc<Indicator>, config: &Config) -> Self {
        Self {
            correlator,
            indicator,
            door_dwell: config.door_dwell(),
        }
    }

    pub fn correlator(&self) -> &Arc<Correlator<T>> {
        &self.correlator
    }

    /// Ask the server, then open or signal denial
    pub fn on_entry_trip(&self) -> EntryDecision {
        tracing::info!("Entry sensor tripped - requesting entry");
        let decision = self.correlator.request_entry();

        match decision {
            EntryDecision::Allowed => {
                tracing::info!("Entry allowed");
                self.indicator.hold_open(self.door_dwell);
            }
            EntryDecision::Denied => {
                tracing::info!("Entry denied - store is at capacity");
                self.indicator.blink(BlinkPattern::Denied);
            }
            EntryDecision::NoResponse => {
                tracing::warn!("No response from server - entry refused");
                self.indicator.blink(BlinkPattern::Unreachable);
                self.correlator.probe();
            }
        }
        decision
    }

    /// Open immediately, notify the server, close after the dwell time
    ///
    /// Time spent waiting for the server counts against the dwell.
    pub fn on_exit_trip(&self) -> ExitOutcome {
        tracing::info!("Exit sensor tripped - opening door and notifying server");
        self.indicator.open();
        let opened = Instant::now();

        let outcome = self.correlator.notify_exit();

        thread::sleep(self.door_dwell.saturating_sub(opened.elapsed()));
        self.indicator.close();
        outcome
    }

    pub fn handle(&self, event: SensorEvent) {
        match event {
            SensorEvent::EntryTrip => {
                self.on_entry_trip();
            }
            SensorEvent::ExitTrip => {
                self.on_exit_trip();
            }
        }
    }

    /// Start one worker thread per sensor
    pub fn spawn_workers(self: Arc<Self>) -> Result<SensorWorkers> {
        let (entry_tx, entry_rx) = channel::bounded(1);
        let (exit_tx, exit_rx) = channel::bounded(1);

        let handles = vec![
            spawn_worker("entry-worker", Arc::clone(&self), entry_rx)?,
            spawn_worker("exit-worker", self, exit_rx)?,
        ];

        Ok(SensorWorkers {
            entry: entry_tx,
            exit: exit_tx,
            handles,
        })
    }
}

fn spawn_worker<T: Transport + 'static>(
    name: &str,
    access_point: Arc<AccessPoint<T>>,
    events: Receiver<SensorEvent>,
) -> Result<JoinHandle<()>> {
    let name = name.to_string();
    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            for event in events.iter() {
                access_point.handle(event);
            }
            tracing::debug!("{} stopped", name);
        })?;
    Ok(handle)
}

/// Running entry and exit workers
pub struct SensorWorkers {
    entry: Sender<SensorEvent>,
    exit: Sender<SensorEvent>,
    handles: Vec<JoinHandle<()>>,
}

impl SensorWorkers {
    /// Deliver a sensor trip to its worker
    ///
    /// A trip arriving while the worker still has one queued is dropped,
    /// like a sensor press during a door cycle. Returns whether it was queued.
    pub fn trigger(&self, event: SensorEvent) -> bool {
        let sender = match event {
            SensorEvent::EntryTrip => &self.entry,
            SensorEvent::ExitTrip => &self.exit,
        };
        match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Ignoring {:?}: worker busy", event);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("Ignoring {:?}: worker stopped", event);
                false
            }
        }
    }

    /// Stop accepting trips and wait for in-flight ones to finish
    pub fn shutdown(self) {
        drop(self.entry);
        drop(self.exit);
        for handle in self.handles {
            if handle.join().is_err() {
                tracing::error!("Sensor worker panicked");
            }
        }
    }
}
