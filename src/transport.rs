//! Boundary to the platform connection.
//!
//! Connecting, authenticating, encrypting and framing are the transport's
//! job. The client only issues fire-and-forget commands and consumes the
//! events the transport reports back.

use async_trait::async_trait;

use crate::config::Credentials;
use crate::protocol::{Packet, Route};

/// Outcome of a log-on attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failure { reason: String },
}

impl LoginOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }
}

/// Something the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    LoggedOn(LoginOutcome),
    /// The platform ended our logon; a disconnect normally follows.
    LoggedOff { reason: String },
    /// A coordinator message for our app.
    Message(Packet),
}

/// Connection to the platform.
///
/// Outbound calls never fail from the client's point of view: problems show
/// up later as a [`TransportEvent::Disconnected`].
#[async_trait]
pub trait Transport: Send {
    /// Begin connecting. Completion is reported as [`TransportEvent::Connected`].
    fn connect(&mut self);

    fn disconnect(&mut self);

    /// Submit a log-on request. The result arrives as [`TransportEvent::LoggedOn`].
    fn log_on(&mut self, credentials: &Credentials);

    fn send(&mut self, route: Route, packet: Packet);

    /// Wait for the next event. `None` means no event will ever arrive again.
    ///
    /// Must be cancel-safe: the client drops this future whenever its wait
    /// times out, and no event may be lost when that happens.
    async fn next_event(&mut self) -> Option<TransportEvent>;
}
