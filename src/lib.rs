//! Lobby Agent Library
//!
//! An unattended client that logs on to the game platform, opens a session
//! with the game coordinator and keeps asking it to create a custom lobby
//! until the coordinator confirms.
//!
//! # Overview
//!
//! - **Session State Machine** - Tracks how far the client has got (connecting,
//!   awaiting login, logged in, awaiting the coordinator's welcome, ready) with
//!   validated transitions.
//!
//! - **Handshake** - Waits a settle delay after login before saying hello to
//!   the coordinator, once per login.
//!
//! - **Lobby Retry** - Sends the create-request on welcome and resends it once
//!   per retry interval until it is acknowledged.
//!
//! - **Dispatch** - Routes inbound coordinator messages to handlers by type id.
//!
//! # Design Principles
//!
//! 1. **State is pure** - Everything under [`state`] takes explicit timestamps
//!    and does no I/O.
//!
//! 2. **Transport is a trait** - The client only sees [`Transport`]; the real
//!    network stack and [`SimulatedCoordinator`] plug in the same way.
//!
//! 3. **Single task** - Handlers run to completion on the event loop, so no
//!    state is shared across threads.
//!
//! 4. **Disconnects never stop the client** - Only a refused login does.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use lobby_agent::{
//!     AfterLobbyCreated, AgentConfig, Client, Credentials, LobbyConfig, SimulatedCoordinator,
//! };
//!
//! let mut config = AgentConfig::new(
//!     Credentials::new("lobbybot", "hunter2"),
//!     LobbyConfig::new(1613886175, "ranked_1x8").with_server_region(12),
//! );
//! config.client = config
//!     .client
//!     .with_after_lobby_created(AfterLobbyCreated::Shutdown);
//! config.client.settle_delay = Duration::ZERO;
//!
//! let runtime = tokio::runtime::Builder::new_current_thread()
//!     .enable_time()
//!     .build()
//!     .unwrap();
//!
//! let mut client = Client::new(SimulatedCoordinator::new(), config).unwrap();
//! let snapshot = runtime.block_on(client.run()).unwrap();
//!
//! assert!(!snapshot.lobby_pending);
//! assert_eq!(snapshot.create_requests, 1);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod simulated;
pub mod state;
pub mod transport;

pub use client::{Client, Session};
pub use config::{AfterLobbyCreated, AgentConfig, ClientSettings, Credentials, LobbyConfig};
pub use error::{ClientError, ConfigError, HandlerError, MessageError};
pub use protocol::{GcMessage, Packet, Route};
pub use simulated::SimulatedCoordinator;
pub use state::SessionSnapshot;
pub use transport::{LoginOutcome, Transport, TransportEvent};
