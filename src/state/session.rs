//! Session state machine.
//!
//! Tracks how far the client has got towards a usable coordinator session
//! and validates transitions.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────────────┐
//! │ Disconnected │◀─────────────────────────────────────┐
//! └──────┬───────┘                                      │
//!        │ connect                                      │
//!        ▼                                              │
//! ┌──────────────┐  transport_connected  ┌───────────────┐
//! │  Connecting  │──────────────────────▶│ AwaitingLogin │
//! └──────────────┘                       └──┬─────────┬──┘
//!                                 login ok  │         │ login failed
//!                                           ▼         ▼
//!                                   ┌──────────┐  ┌────────┐
//!                                   │ LoggedIn │  │ Halted │ (terminal)
//!                                   └────┬─────┘  └────────┘
//!                             hello sent │
//!                                        ▼
//!                              ┌───────────────────┐
//!                              │ AwaitingGCWelcome │
//!                              └─────────┬─────────┘
//!                                welcome │
//!                                        ▼
//!                                   ┌─────────┐
//!                                   │  Ready  │
//!                                   └─────────┘
//!
//!  transport_disconnected: any non-terminal state ──▶ Disconnected
//! ```

use std::fmt;

use serde::Serialize;

/// Where the session currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No transport connection
    #[default]
    Disconnected,

    /// Connect requested, waiting for the transport
    Connecting,

    /// Transport up, log-on submitted
    AwaitingLogin,

    /// Logged on, waiting out the settle delay before saying hello
    LoggedIn,

    /// Hello sent, waiting for the coordinator's welcome
    #[serde(rename = "awaiting_gc_welcome")]
    AwaitingGcWelcome,

    /// Coordinator session established
    Ready,

    /// Login was refused; nothing more will happen
    Halted { reason: String },
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        !matches!(
            self,
            Self::Disconnected | Self::Connecting | Self::Halted { .. }
        )
    }

    /// Logged on to the platform (coordinator session may still be pending).
    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn | Self::AwaitingGcWelcome | Self::Ready)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted { .. })
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::AwaitingLogin => write!(f, "AwaitingLogin"),
            Self::LoggedIn => write!(f, "LoggedIn"),
            Self::AwaitingGcWelcome => write!(f, "AwaitingGCWelcome"),
            Self::Ready => write!(f, "Ready"),
            Self::Halted { reason } => write!(f, "Halted({})", reason),
        }
    }
}

/// State transition events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connect,
    TransportConnected,
    LoginSucceeded,
    LoginFailed { reason: String },
    HelloSent,
    WelcomeReceived,
    TransportDisconnected,
}

/// Error when a state transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: SessionState,
    pub event: SessionEvent,
    pub reason: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid transition from {} via {:?}: {}",
            self.from, self.event, self.reason
        )
    }
}

impl std::error::Error for InvalidTransition {}

/// Session state machine.
///
/// Only the client's lifecycle code drives this.
#[derive(Debug, Clone, Default)]
pub struct SessionMachine {
    state: SessionState,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a specific state.
    pub fn at(state: SessionState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply an event, returning the new machine or an error.
    pub fn apply(&self, event: SessionEvent) -> Result<Self, InvalidTransition> {
        Ok(Self {
            state: self.transition(&event)?,
        })
    }

    /// Apply an event in place, returning error if invalid.
    pub fn apply_mut(&mut self, event: SessionEvent) -> Result<(), InvalidTransition> {
        self.state = self.transition(&event)?;
        Ok(())
    }

    fn transition(&self, event: &SessionEvent) -> Result<SessionState, InvalidTransition> {
        use SessionEvent::*;
        use SessionState::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.state.clone(),
            event: event.clone(),
            reason,
        };

        match (&self.state, event) {
            (Halted { .. }, _) => Err(invalid("Session halted")),

            // Disconnect: any live state -> Disconnected (repeat disconnects included)
            (_, TransportDisconnected) => Ok(Disconnected),

            (Disconnected, Connect) => Ok(Connecting),
            (_, Connect) => Err(invalid("Already connecting or connected")),

            // Some transports come up without an explicit connect request
            (Disconnected | Connecting, TransportConnected) => Ok(AwaitingLogin),
            (_, TransportConnected) => Err(invalid("Already connected")),

            (AwaitingLogin, LoginSucceeded) => Ok(LoggedIn),
            (AwaitingLogin, LoginFailed { reason }) => Ok(Halted {
                reason: reason.clone(),
            }),
            (_, LoginSucceeded | LoginFailed { .. }) => Err(invalid("No login in progress")),

            (LoggedIn, HelloSent) => Ok(AwaitingGcWelcome),
            // Welcome can beat a late hello; the session is already up
            (AwaitingGcWelcome, HelloSent) => Ok(AwaitingGcWelcome),
            (Ready, HelloSent) => Ok(Ready),
            (_, HelloSent) => Err(invalid("Must be logged in")),

            (LoggedIn | AwaitingGcWelcome | Ready, WelcomeReceived) => Ok(Ready),
            (_, WelcomeReceived) => Err(invalid("Must be logged in")),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.is_logged_in()
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn is_halted(&self) -> bool {
        self.state.is_halted()
    }
}
