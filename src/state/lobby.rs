//! Lobby creation and its retry timer.
//!
//! The coordinator is known to drop create-requests without answering, so a
//! request stays pending until something acknowledges it, and is resent once
//! per full retry interval of silence.
//!
//! ```text
//!            mark_sent                 acknowledge
//!   Idle ───────────────▶ Pending ─────────────────▶ Idle
//!                          │   ▲
//!                          └───┘ tick: countdown expired → resend
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::debug;

use crate::config::LobbyConfig;
use crate::protocol::{
    BotDifficulty, CmPick, GameVersion, LobbyDetails, LobbyVisibility, PauseSetting,
    PracticeLobbyCreate, TeamDetails, TvDelay,
};

/// Number of team-details records attached to every request.
pub const TEAM_RECORDS: usize = 1;

/// Build the create-request for a lobby.
///
/// Everything not in [`LobbyConfig`] is fixed: spectators allowed, random
/// captain pick, hard bots on both sides, stable game version, public, limited
/// pauses, no all-chat, no cheats.
pub fn build_create_request(config: &LobbyConfig, now: DateTime<Utc>) -> PracticeLobbyCreate {
    let details = LobbyDetails {
        game_name: config.game_name.clone(),
        pass_key: config.pass_key.clone(),
        server_region: config.server_region,
        game_mode: config.game_mode,
        custom_game_mode: config.custom_game_id.to_string(),
        custom_map_name: config.custom_map_name.clone(),
        custom_game_id: config.custom_game_id,
        custom_min_players: config.min_players,
        custom_max_players: config.max_players,
        custom_game_timestamp: u32::try_from(now.timestamp()).unwrap_or(0),
        custom_difficulty: 0,
        visibility: LobbyVisibility::Public,
        allow_spectating: true,
        cm_pick: CmPick::Random,
        bot_difficulty_radiant: BotDifficulty::Hard,
        bot_difficulty_dire: BotDifficulty::Hard,
        bot_radiant: 0,
        bot_dire: 0,
        game_version: GameVersion::Stable,
        dota_tv_delay: TvDelay::Seconds120,
        pause_setting: PauseSetting::Limited,
        lan: false,
        allchat: false,
        allow_cheats: false,
        fill_with_bots: false,
        intro_mode: false,
        leagueid: 0,
        lobby_id: 0,
        load_game_id: 0,
        previous_match_override: 0,
        series_type: 0,
        radiant_series_wins: 0,
        dire_series_wins: 0,
        penalty_level_radiant: 0,
        penalty_level_dire: 0,
        team_details: vec![TeamDetails::default(); TEAM_RECORDS],
    };

    PracticeLobbyCreate {
        pass_key: config.pass_key.clone(),
        search_key: String::new(),
        lobby_details: details,
    }
}

/// Retry state for the create-request.
///
/// `pending` is true iff a request has been sent and not yet acknowledged.
#[derive(Debug, Clone)]
pub struct LobbyRetry {
    pending: bool,

    retry_interval: Duration,

    /// Elapsed times at or above this are treated as noise, not countdown
    max_tick_step: Duration,

    /// Countdown to the next resend
    remaining: Duration,

    last_sent_at: Option<Instant>,

    last_tick: Option<Instant>,

    /// Requests sent since the client started, resends included
    pub attempts: u32,

    /// Requests sent because the previous one went unanswered
    pub resends: u32,

    /// When the coordinator last acknowledged a request
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl LobbyRetry {
    pub fn new(retry_interval: Duration, max_tick_step: Duration) -> Self {
        Self {
            pending: false,
            retry_interval,
            max_tick_step,
            remaining: retry_interval,
            last_sent_at: None,
            last_tick: None,
            attempts: 0,
            resends: 0,
            confirmed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn last_sent_at(&self) -> Option<Instant> {
        self.last_sent_at
    }

    /// Time left before a resend, while pending.
    pub fn remaining(&self) -> Option<Duration> {
        self.pending.then_some(self.remaining)
    }

    /// Record that a request just went out. Restarts the countdown.
    pub fn mark_sent(&mut self, now: Instant, is_resend: bool) {
        self.pending = true;
        self.remaining = self.retry_interval;
        self.last_sent_at = Some(now);
        self.last_tick = Some(now);
        self.attempts += 1;
        if is_resend {
            self.resends += 1;
        }
    }

    /// Advance the countdown. Returns true when a resend is due.
    ///
    /// Called once per loop iteration. The countdown only moves for elapsed
    /// times that are non-zero and below the noise threshold.
    pub fn tick(&mut self, now: Instant) -> bool {
        let last = self.last_tick.replace(now);
        if !self.pending {
            return false;
        }
        let Some(last) = last else {
            return false;
        };

        let elapsed = now.saturating_duration_since(last);
        if elapsed.is_zero() {
            return false;
        }
        if elapsed >= self.max_tick_step {
            debug!(?elapsed, "ignoring oversized tick for lobby retry countdown");
            return false;
        }

        self.remaining = self.remaining.saturating_sub(elapsed);
        self.remaining.is_zero()
    }

    /// Stop retrying. Returns whether a request was pending.
    pub fn acknowledge(&mut self) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.remaining = self.retry_interval;
        self.confirmed_at = Some(Utc::now());
        true
    }

    /// Forget any pending request, e.g. after losing the connection.
    pub fn reset(&mut self) {
        self.pending = false;
        self.remaining = self.retry_interval;
        self.last_tick = None;
    }
}
