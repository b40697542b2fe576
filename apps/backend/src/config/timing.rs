//! Timing and sizing knobs for channels, battles and the lobby.
//!
//! Defaults reproduce the production game: 10 s probes, 30 s reply eviction,
//! 10 s turns with a 2 s bot grace and a 5 s pause between turns.

use std::time::Duration;

use crate::domain::rules::{BOT_SLOTS, MAX_HP, ROSTER_SIZE};

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Send liveness probes. When false a single idle timer re-arms instead.
    pub ping: bool,
    pub ping_interval: Duration,
    /// Extra time after `ping_interval` before an unanswered probe closes the connection.
    pub ping_timeout: Duration,
    /// Unanswered continuations are evicted after this long.
    pub reply_timeout: Duration,
    /// Upper bound on how long `emit` waits for the channel to open.
    pub open_wait: Duration,
    /// Delay between a `deny` notification and the close.
    pub deny_delay: Duration,
    /// Randomized `retry` backoff: `retry_base + [0, retry_jitter)`.
    pub retry_base: Duration,
    pub retry_jitter: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ping: true,
            ping_interval: Duration::from_secs(10),
            ping_timeout: Duration::from_secs(10),
            reply_timeout: Duration::from_secs(30),
            open_wait: Duration::from_secs(30),
            deny_delay: Duration::from_secs(10),
            retry_base: Duration::from_secs(5),
            retry_jitter: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BattleConfig {
    /// Countdown ticks per turn.
    pub turn_ticks: u32,
    pub tick: Duration,
    /// Delay before bots submit; must be shorter than a full turn.
    pub bot_grace: Duration,
    pub post_turn_delay: Duration,
    pub max_hp: u8,
    pub roster_size: usize,
    /// Fixed RNG seed for reproducible shuffles and bot choices.
    pub seed: Option<u64>,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            turn_ticks: 10,
            tick: Duration::from_secs(1),
            bot_grace: Duration::from_secs(2),
            post_turn_delay: Duration::from_secs(5),
            max_hp: MAX_HP,
            roster_size: ROSTER_SIZE,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Bots seeded into every new forming battle.
    pub bots: usize,
    /// Usernames are trimmed and cut to this many characters.
    pub max_username_chars: usize,
    pub battle: BattleConfig,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            bots: BOT_SLOTS,
            max_username_chars: 30,
            battle: BattleConfig::default(),
        }
    }
}
