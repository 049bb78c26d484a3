//! Client configuration.
//!
//! Everything here is supplied once at startup and never changes during a
//! session. The binary reads it from a TOML file:
//!
//! ```toml
//! [credentials]
//! username = "lobbybot"
//! password = "hunter2"
//!
//! [lobby]
//! pass_key = "123"
//! custom_game_id = 1613886175
//! custom_map_name = "ranked_1x8"
//! game_name = "ranked_1x8"
//! min_players = 1
//! max_players = 8
//! server_region = 12
//!
//! [client]
//! settle_delay_secs = 5
//! retry_interval_secs = 5
//! after_lobby_created = "keep-alive"
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol::GAME_MODE_CUSTOM;

/// Default pause after login before saying hello, so the platform can open
/// its own session with the coordinator.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Default silence before a create-request is resent.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Default upper bound on a single wait for transport events.
pub const DEFAULT_EVENT_WAIT: Duration = Duration::from_secs(1);

/// Default noise threshold: elapsed times at or above this are not counted
/// against the retry countdown.
pub const DEFAULT_MAX_TICK_STEP: Duration = Duration::from_secs(3);

/// Account used to log on to the platform.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    /// May be left out of the file and supplied from the environment instead
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What the lobby we ask the coordinator for should look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LobbyConfig {
    /// Password players need to join the lobby
    #[serde(default)]
    pub pass_key: String,

    /// Workshop id of the custom game
    pub custom_game_id: u64,

    pub custom_map_name: String,

    /// Lobby display name
    #[serde(default)]
    pub game_name: String,

    #[serde(default = "default_min_players")]
    pub min_players: u32,

    #[serde(default = "default_max_players")]
    pub max_players: u32,

    #[serde(default = "default_game_mode")]
    pub game_mode: u32,

    #[serde(default = "default_server_region")]
    pub server_region: u32,
}

fn default_min_players() -> u32 {
    1
}

fn default_max_players() -> u32 {
    8
}

fn default_game_mode() -> u32 {
    GAME_MODE_CUSTOM
}

fn default_server_region() -> u32 {
    12
}

impl LobbyConfig {
    /// Create a custom-game lobby config with default player counts and region.
    pub fn new(custom_game_id: u64, custom_map_name: impl Into<String>) -> Self {
        let custom_map_name = custom_map_name.into();
        Self {
            pass_key: String::new(),
            custom_game_id,
            game_name: custom_map_name.clone(),
            custom_map_name,
            min_players: default_min_players(),
            max_players: default_max_players(),
            game_mode: default_game_mode(),
            server_region: default_server_region(),
        }
    }

    #[must_use]
    pub fn with_pass_key(mut self, pass_key: impl Into<String>) -> Self {
        self.pass_key = pass_key.into();
        self
    }

    #[must_use]
    pub fn with_game_name(mut self, game_name: impl Into<String>) -> Self {
        self.game_name = game_name.into();
        self
    }

    #[must_use]
    pub fn with_players(mut self, min_players: u32, max_players: u32) -> Self {
        self.min_players = min_players;
        self.max_players = max_players;
        self
    }

    #[must_use]
    pub fn with_game_mode(mut self, game_mode: u32) -> Self {
        self.game_mode = game_mode;
        self
    }

    #[must_use]
    pub fn with_server_region(mut self, server_region: u32) -> Self {
        self.server_region = server_region;
        self
    }

    /// Check invariants that the types alone don't enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.custom_map_name.trim().is_empty() {
            return Err(ConfigError::invalid("custom_map_name", "must not be empty"));
        }
        if self.min_players > self.max_players {
            return Err(ConfigError::invalid(
                "min_players",
                format!(
                    "{} is greater than max_players ({})",
                    self.min_players, self.max_players
                ),
            ));
        }
        Ok(())
    }
}

/// What to do once the coordinator confirms the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AfterLobbyCreated {
    /// Keep the session alive and keep pumping events.
    #[default]
    KeepAlive,
    /// Disconnect and return from the event loop.
    Shutdown,
}

/// Timing and termination policy for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub settle_delay: Duration,
    pub retry_interval: Duration,
    pub event_wait: Duration,
    pub max_tick_step: Duration,
    pub after_lobby_created: AfterLobbyCreated,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            event_wait: DEFAULT_EVENT_WAIT,
            max_tick_step: DEFAULT_MAX_TICK_STEP,
            after_lobby_created: AfterLobbyCreated::default(),
        }
    }
}

impl ClientSettings {
    #[must_use]
    pub fn with_after_lobby_created(mut self, policy: AfterLobbyCreated) -> Self {
        self.after_lobby_created = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_interval.is_zero() {
            return Err(ConfigError::invalid("retry_interval_secs", "must be positive"));
        }
        if self.event_wait.is_zero() {
            return Err(ConfigError::invalid("event_wait_secs", "must be positive"));
        }
        // A wait that always reaches the noise threshold would never count down.
        if self.max_tick_step <= self.event_wait {
            return Err(ConfigError::invalid(
                "max_tick_step_secs",
                "must be greater than event_wait_secs",
            ));
        }
        Ok(())
    }
}

/// `[client]` table as it appears in the file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClientSection {
    #[serde(default = "default_settle_delay_secs")]
    settle_delay_secs: u64,
    #[serde(default = "default_retry_interval_secs")]
    retry_interval_secs: u64,
    #[serde(default = "default_event_wait_secs")]
    event_wait_secs: u64,
    #[serde(default = "default_max_tick_step_secs")]
    max_tick_step_secs: u64,
    #[serde(default)]
    after_lobby_created: AfterLobbyCreated,
}

fn default_settle_delay_secs() -> u64 {
    DEFAULT_SETTLE_DELAY.as_secs()
}

fn default_retry_interval_secs() -> u64 {
    DEFAULT_RETRY_INTERVAL.as_secs()
}

fn default_event_wait_secs() -> u64 {
    DEFAULT_EVENT_WAIT.as_secs()
}

fn default_max_tick_step_secs() -> u64 {
    DEFAULT_MAX_TICK_STEP.as_secs()
}

impl From<ClientSection> for ClientSettings {
    fn from(section: ClientSection) -> Self {
        Self {
            settle_delay: Duration::from_secs(section.settle_delay_secs),
            retry_interval: Duration::from_secs(section.retry_interval_secs),
            event_wait: Duration::from_secs(section.event_wait_secs),
            max_tick_step: Duration::from_secs(section.max_tick_step_secs),
            after_lobby_created: section.after_lobby_created,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    credentials: Credentials,
    lobby: LobbyConfig,
    client: Option<ClientSection>,
}

/// Complete configuration for one client instance.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub credentials: Credentials,
    pub lobby: LobbyConfig,
    pub client: ClientSettings,
}

impl AgentConfig {
    pub fn new(credentials: Credentials, lobby: LobbyConfig) -> Self {
        Self {
            credentials,
            lobby,
            client: ClientSettings::default(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        let config = Self {
            credentials: file.credentials,
            lobby: file.lobby,
            client: file.client.map(ClientSettings::from).unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.credentials.username.trim().is_empty() {
            return Err(ConfigError::invalid("username", "must not be empty"));
        }
        self.lobby.validate()?;
        self.client.validate()
    }
}
