//! Coordinator handshake bookkeeping.
//!
//! After login the platform needs a moment to open its own connection to the
//! coordinator, so the hello is scheduled rather than sent right away. The
//! schedule is a plain deadline checked by the event loop, which keeps the
//! loop responsive (a disconnect during the delay cancels it).

use std::time::Duration;

use tokio::time::Instant;

use crate::protocol::ClientWelcome;

#[derive(Debug, Clone)]
pub struct Handshake {
    settle_delay: Duration,

    /// When the hello should go out, if one is scheduled
    hello_due: Option<Instant>,

    /// Hellos sent since the client started
    pub hellos_sent: u32,

    /// Welcomes received since the client started
    pub welcomes: u32,

    /// Version the coordinator reported in its last welcome
    pub coordinator_version: Option<u32>,
}

impl Handshake {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            settle_delay,
            hello_due: None,
            hellos_sent: 0,
            welcomes: 0,
            coordinator_version: None,
        }
    }

    /// Schedule the hello after the settle delay.
    pub fn on_logged_in(&mut self, now: Instant) {
        self.hello_due = Some(now + self.settle_delay);
    }

    pub fn hello_due(&self) -> Option<Instant> {
        self.hello_due
    }

    /// True exactly once, when the scheduled hello should be sent now.
    ///
    /// Only clears the schedule; the caller counts the hello with
    /// [`Handshake::record_hello`] once it has actually gone out.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.hello_due {
            Some(due) if now >= due => {
                self.hello_due = None;
                true
            }
            _ => false,
        }
    }

    pub fn record_hello(&mut self) {
        self.hellos_sent += 1;
    }

    pub fn on_welcome(&mut self, welcome: &ClientWelcome) {
        self.welcomes += 1;
        self.coordinator_version = Some(welcome.version);
    }

    /// Cancel any scheduled hello.
    pub fn reset(&mut self) {
        self.hello_due = None;
    }

    /// How long until the hello is due, if one is scheduled.
    pub fn time_until_hello(&self, now: Instant) -> Option<Duration> {
        self.hello_due.map(|due| due.saturating_duration_since(now))
    }
}
