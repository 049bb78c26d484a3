//! Coordinator message vocabulary.
//!
//! The real transport owns the binary encoding. Inside this crate every
//! payload is a typed message with named fields; [`GcMessage`] turns those
//! into opaque [`Packet`]s (JSON bytes) and back.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::MessageError;

/// App id of the game whose coordinator we talk to.
pub const APP_ID: u32 = 570;

/// Game mode id for custom games.
pub const GAME_MODE_CUSTOM: u32 = 15;

/// Source 2 engine marker carried by the session hello.
pub const ENGINE_SOURCE2: u32 = 1;

/// Message type identifiers.
pub mod msg {
    /// Platform message announcing which app the client is running.
    pub const CLIENT_GAMES_PLAYED: u32 = 742;
    /// Coordinator welcome, answering a hello (or sent after a coordinator restart).
    pub const GC_CLIENT_WELCOME: u32 = 4004;
    /// Session hello sent to the coordinator.
    pub const GC_CLIENT_HELLO: u32 = 4006;
    /// Practice lobby create request. The coordinator echoes this type back on success.
    pub const GC_PRACTICE_LOBBY_CREATE: u32 = 7038;
    /// Generic practice lobby response carrying a result code.
    pub const GC_PRACTICE_LOBBY_RESPONSE: u32 = 7055;
}

/// Where an outbound packet goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The platform itself (not the game coordinator).
    Platform,
    /// The coordinator of the given app.
    Coordinator { app_id: u32 },
}

/// An opaque message: type id plus raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub type_id: u32,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(type_id: u32, payload: Vec<u8>) -> Self {
        Self { type_id, payload }
    }
}

/// A typed message with a fixed type id.
pub trait GcMessage: Serialize + DeserializeOwned {
    const TYPE_ID: u32;

    fn encode(&self) -> Result<Packet, MessageError> {
        serde_json::to_vec(self)
            .map(|payload| Packet::new(Self::TYPE_ID, payload))
            .map_err(|source| MessageError::Encode {
                type_id: Self::TYPE_ID,
                source,
            })
    }

    fn decode(packet: &Packet) -> Result<Self, MessageError> {
        if packet.type_id != Self::TYPE_ID {
            return Err(MessageError::WrongType {
                expected: Self::TYPE_ID,
                actual: packet.type_id,
            });
        }
        serde_json::from_slice(&packet.payload).map_err(|source| MessageError::Decode {
            type_id: Self::TYPE_ID,
            source,
        })
    }
}

/// Human-readable name for a message type id, for logs.
pub fn message_name(type_id: u32) -> Option<&'static str> {
    match type_id {
        msg::CLIENT_GAMES_PLAYED => Some("ClientGamesPlayed"),
        msg::GC_CLIENT_WELCOME => Some("GCClientWelcome"),
        msg::GC_CLIENT_HELLO => Some("GCClientHello"),
        msg::GC_PRACTICE_LOBBY_CREATE => Some("GCPracticeLobbyCreate"),
        msg::GC_PRACTICE_LOBBY_RESPONSE => Some("GCPracticeLobbyResponse"),
        _ => None,
    }
}

// Handshake messages

/// Tells the platform we are now "playing" the app so it opens a coordinator session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamesPlayed {
    pub games: Vec<u32>,
}

impl GamesPlayed {
    pub fn single(app_id: u32) -> Self {
        Self {
            games: vec![app_id],
        }
    }
}

impl GcMessage for GamesPlayed {
    const TYPE_ID: u32 = msg::CLIENT_GAMES_PLAYED;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientHello {
    pub engine: u32,
}

impl Default for ClientHello {
    fn default() -> Self {
        Self {
            engine: ENGINE_SOURCE2,
        }
    }
}

impl GcMessage for ClientHello {
    const TYPE_ID: u32 = msg::GC_CLIENT_HELLO;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientWelcome {
    #[serde(default)]
    pub version: u32,
}

impl GcMessage for ClientWelcome {
    const TYPE_ID: u32 = msg::GC_CLIENT_WELCOME;
}

// Lobby settings

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyVisibility {
    Public,
    Friends,
    Unlisted,
}

/// Captains mode pick order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmPick {
    Random,
    GoodGuys,
    BadGuys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotDifficulty {
    Passive,
    Easy,
    Medium,
    Hard,
    Unfair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameVersion {
    Current,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseSetting {
    Unlimited,
    Limited,
    Disabled,
}

/// Broadcast delay for spectators, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TvDelay {
    #[serde(rename = "10")]
    Seconds10,
    #[serde(rename = "120")]
    Seconds120,
    #[serde(rename = "300")]
    Seconds300,
}

/// Per-team record attached to lobby details. Only defaults are ever sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDetails {
    pub team_name: String,
    pub team_tag: String,
    pub team_id: u32,
    pub team_logo: u64,
    pub team_base_logo: u64,
    pub team_banner_logo: u64,
    pub team_complete: bool,
    pub rank: u32,
    pub rank_change: i32,
    pub is_home_team: bool,
    pub guild_id: u32,
    pub guild_name: String,
    pub guild_tag: String,
    pub guild_logo: u64,
    pub guild_base_logo: u64,
    pub guild_banner_logo: u64,
}

/// Settings of the practice lobby being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyDetails {
    pub game_name: String,
    pub pass_key: String,
    pub server_region: u32,
    pub game_mode: u32,
    pub custom_game_mode: String,
    pub custom_map_name: String,
    pub custom_game_id: u64,
    pub custom_min_players: u32,
    pub custom_max_players: u32,
    pub custom_game_timestamp: u32,
    pub custom_difficulty: u32,
    pub visibility: LobbyVisibility,
    pub allow_spectating: bool,
    pub cm_pick: CmPick,
    pub bot_difficulty_radiant: BotDifficulty,
    pub bot_difficulty_dire: BotDifficulty,
    pub bot_radiant: u64,
    pub bot_dire: u64,
    pub game_version: GameVersion,
    pub dota_tv_delay: TvDelay,
    pub pause_setting: PauseSetting,
    pub lan: bool,
    pub allchat: bool,
    pub allow_cheats: bool,
    pub fill_with_bots: bool,
    pub intro_mode: bool,
    pub leagueid: u32,
    pub lobby_id: u64,
    pub load_game_id: u64,
    pub previous_match_override: u64,
    pub series_type: u32,
    pub radiant_series_wins: u32,
    pub dire_series_wins: u32,
    pub penalty_level_radiant: u32,
    pub penalty_level_dire: u32,
    pub team_details: Vec<TeamDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeLobbyCreate {
    pub pass_key: String,
    pub search_key: String,
    pub lobby_details: LobbyDetails,
}

impl GcMessage for PracticeLobbyCreate {
    const TYPE_ID: u32 = msg::GC_PRACTICE_LOBBY_CREATE;
}

/// Coordinator result code for a lobby operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyResult {
    Success,
    AlreadyInGame,
    InvalidLobby,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeLobbyResponse {
    pub result: LobbyResult,
}

impl GcMessage for PracticeLobbyResponse {
    const TYPE_ID: u32 = msg::GC_PRACTICE_LOBBY_RESPONSE;
}
