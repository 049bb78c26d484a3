//! In-process stand-in for the platform and its game coordinator.
//!
//! Answers the way the real service does when things go well: connect,
//! log-on, welcome after hello, and an echo of the create-request once the
//! lobby exists. Knobs let it misbehave the way the real one does too:
//! swallow create-requests, drop the connection mid-handshake, or refuse the
//! login.

use std::collections::VecDeque;

use async_trait::async_trait;
use tracing::debug;

use crate::config::Credentials;
use crate::protocol::{msg, ClientWelcome, GcMessage, Packet, Route, APP_ID};
use crate::transport::{LoginOutcome, Transport, TransportEvent};

#[derive(Debug, Default)]
pub struct SimulatedCoordinator {
    events: VecDeque<TransportEvent>,
    connected: bool,
    logged_in: bool,

    /// Create-requests still to be swallowed without an answer
    drop_creates: u32,

    /// Hellos still to be answered by dropping the connection
    drop_connections: u32,

    deny_login: Option<String>,
    welcome_version: u32,

    sent: Vec<(Route, Packet)>,
    connects: u32,
    logons: u32,
}

impl SimulatedCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore the first `count` create-requests.
    #[must_use]
    pub fn with_dropped_creates(mut self, count: u32) -> Self {
        self.drop_creates = count;
        self
    }

    /// Answer the first `count` hellos by dropping the connection.
    #[must_use]
    pub fn with_connection_drops(mut self, count: u32) -> Self {
        self.drop_connections = count;
        self
    }

    /// Refuse every log-on with the given reason.
    #[must_use]
    pub fn with_login_denied(mut self, reason: impl Into<String>) -> Self {
        self.deny_login = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_welcome_version(mut self, version: u32) -> Self {
        self.welcome_version = version;
        self
    }

    /// Everything the client has sent, in order.
    pub fn sent(&self) -> &[(Route, Packet)] {
        &self.sent
    }

    /// Count sent packets of one type.
    pub fn sent_count(&self, type_id: u32) -> usize {
        self.sent.iter().filter(|(_, p)| p.type_id == type_id).count()
    }

    pub fn connects(&self) -> u32 {
        self.connects
    }

    pub fn logons(&self) -> u32 {
        self.logons
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Lose the connection as if the network went away.
    pub fn drop_connection(&mut self) {
        self.connected = false;
        self.logged_in = false;
        self.events.push_back(TransportEvent::Disconnected);
    }

    fn coordinator_message(&mut self, packet: &Packet) {
        match packet.type_id {
            msg::GC_CLIENT_HELLO if self.logged_in => {
                if self.drop_connections > 0 {
                    self.drop_connections -= 1;
                    debug!("simulated coordinator dropping connection after hello");
                    self.drop_connection();
                    return;
                }
                let welcome = ClientWelcome {
                    version: self.welcome_version,
                };
                if let Ok(reply) = welcome.encode() {
                    self.events.push_back(TransportEvent::Message(reply));
                }
            }
            msg::GC_PRACTICE_LOBBY_CREATE if self.logged_in => {
                if self.drop_creates > 0 {
                    self.drop_creates -= 1;
                    debug!(remaining = self.drop_creates, "simulated coordinator ignoring create request");
                    return;
                }
                self.events.push_back(TransportEvent::Message(Packet::new(
                    msg::GC_PRACTICE_LOBBY_CREATE,
                    b"{}".to_vec(),
                )));
            }
            _ => {}
        }
    }
}

#[async_trait]
impl Transport for SimulatedCoordinator {
    fn connect(&mut self) {
        self.connects += 1;
        if !self.connected {
            self.connected = true;
            self.events.push_back(TransportEvent::Connected);
        }
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.drop_connection();
        }
    }

    fn log_on(&mut self, _credentials: &Credentials) {
        self.logons += 1;
        if !self.connected {
            return;
        }
        let outcome = match &self.deny_login {
            Some(reason) => LoginOutcome::failure(reason.clone()),
            None => {
                self.logged_in = true;
                LoginOutcome::Success
            }
        };
        self.events.push_back(TransportEvent::LoggedOn(outcome));
    }

    fn send(&mut self, route: Route, packet: Packet) {
        if route == (Route::Coordinator { app_id: APP_ID }) {
            self.coordinator_message(&packet);
        }
        self.sent.push((route, packet));
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        match self.events.pop_front() {
            Some(event) => Some(event),
            None => std::future::pending().await,
        }
    }
}
