//! Payloads carried on the application channels.
//!
//! Every event is a JSON object tagged by `ev`. Server-to-client events are
//! serialize-only; client requests are deserialize-only.

use serde::{Deserialize, Serialize};

/// Named channel for lobby traffic.
pub const LOBBY: &str = "lobby";
/// Named channel for in-match traffic.
pub const BATTLE: &str = "battle";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "ev", rename_all = "kebab-case")]
pub enum LobbyEvent {
    /// Size of the battle currently forming.
    Battlesize { size: usize },
    /// The player's battle has started.
    GoBattle,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "ev", rename_all = "kebab-case")]
pub enum LobbyRequest {
    GetLobby,
    EnterBattle {
        #[serde(default)]
        username: String,
    },
    LeaveBattle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "ev", rename_all = "kebab-case")]
pub enum BattleEvent {
    StartTurn { timer: u32, hp: u8, stunned: bool },
    LockAction,
    TurnResult { log: Vec<LogEntry> },
    EndGame { result: MatchResult },
    SetActions { actions: Vec<Commitment> },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "ev", rename_all = "kebab-case")]
pub enum BattleRequest {
    GetData,
    SetAction {
        #[serde(default)]
        code: String,
    },
}

/// Who has decided this turn. The action itself stays hidden until
/// resolution, so `action` is always empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub username: String,
    pub flag: bool,
    pub action: String,
}

/// A combatant as shown in the turn log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantView {
    pub username: String,
    pub action: String,
    pub hp: u8,
    pub stunned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogEntry {
    /// Pairing with both sides' state before the exchange.
    Match { p1: CombatantView, p2: CombatantView },
    Damage {
        player: String,
        amount: u8,
        newhp: u8,
    },
    Stun { player: String },
    /// Both sides after the exchange.
    Update { p1: CombatantView, p2: CombatantView },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    Won,
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub username: String,
}

/// Reply to `get-data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleData {
    pub status: bool,
    pub timer: u32,
    pub team1: Vec<RosterEntry>,
    pub team2: Vec<RosterEntry>,
    pub username: String,
}

impl BattleData {
    /// Reply for a player who is not in any battle.
    pub fn absent(username: impl Into<String>) -> Self {
        Self {
            status: false,
            timer: 0,
            team1: Vec::new(),
            team2: Vec::new(),
            username: username.into(),
        }
    }
}

/// Reply to `enter-battle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReply {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JoinReply {
    pub fn accepted() -> Self {
        Self {
            status: true,
            error: None,
        }
    }

    pub fn rejected(error: impl ToString) -> Self {
        Self {
            status: false,
            error: Some(error.to_string()),
        }
    }
}
