//! Session state for the lobby agent.
//!
//! Pure state, no I/O: each piece here is driven by the client's event loop
//! and can be tested with explicit timestamps.
//!
//! - `session` - session state machine (how far the handshake has got)
//! - `dispatch` - inbound message routing by type id
//! - `handshake` - settle delay, hello scheduling and welcome bookkeeping
//! - `lobby` - create-request building and the resend countdown
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Client (event loop)                      │
//! │                                                                  │
//! │   transport event ──▶ lifecycle ──▶ SessionMachine               │
//! │         │                 │                                      │
//! │         │ Message         ├──▶ Handshake  (hello after settle)   │
//! │         ▼                 │                                      │
//! │   ┌────────────┐          └──▶ LobbyRetry (resend until ack)     │
//! │   │ Dispatcher │──▶ welcome / create-ack handlers                │
//! │   └────────────┘                                                 │
//! │                                                                  │
//! │   every iteration, after events: hello timer, then retry timer   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod dispatch;
pub mod handshake;
pub mod lobby;
pub mod session;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use dispatch::{Dispatched, Dispatcher, Handler};
pub use handshake::Handshake;
pub use lobby::{build_create_request, LobbyRetry, TEAM_RECORDS};
pub use session::{InvalidTransition, SessionEvent, SessionMachine, SessionState};

/// Point-in-time view of a client, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub hellos_sent: u32,
    pub welcomes: u32,
    pub coordinator_version: Option<u32>,
    /// Create-requests sent, resends included
    pub create_requests: u32,
    pub resends: u32,
    pub lobby_pending: bool,
    pub lobby_confirmed_at: Option<DateTime<Utc>>,
    pub reconnects: u32,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
