use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A move a combatant can commit to for one turn.
///
/// "No action" is modelled as `Option<Action>::None` everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Attack,
    Defend,
    Magic,
}

impl Action {
    /// Every committable action, in wire order. Bots draw uniformly from this.
    pub const ALL: [Action; 3] = [Action::Attack, Action::Defend, Action::Magic];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Attack => "attack",
            Action::Defend => "defend",
            Action::Magic => "magic",
        }
    }
}

/// Wire code for an optional action; the empty string means none.
pub fn action_code(action: Option<Action>) -> &'static str {
    action.map_or("", Action::as_str)
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attack" => Ok(Action::Attack),
            "defend" => Ok(Action::Defend),
            "magic" => Ok(Action::Magic),
            other => Err(DomainError::UnknownAction(other.to_string())),
        }
    }
}
