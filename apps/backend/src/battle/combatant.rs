use crate::channel::Channel;
use crate::domain::{action_code, Action};
use crate::protocol::CombatantView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    One,
    Two,
}

/// One seat in a battle. Humans carry their connection; bots carry none.
pub struct Combatant {
    pub username: String,
    pub link: Option<Channel>,
    pub action: Option<Action>,
    pub hp: u8,
    pub stunned: bool,
    /// Assigned once when the battle starts.
    pub team: Option<Team>,
    /// Left a running match. Keeps the seat and team but never acts again.
    pub departed: bool,
}

impl Combatant {
    pub fn human(username: impl Into<String>, link: Channel) -> Self {
        Self::new(username.into(), Some(link))
    }

    pub fn bot(username: impl Into<String>) -> Self {
        Self::new(username.into(), None)
    }

    fn new(username: String, link: Option<Channel>) -> Self {
        Self {
            username,
            link,
            action: None,
            hp: 0,
            stunned: false,
            team: None,
            departed: false,
        }
    }

    pub fn is_bot(&self) -> bool {
        self.link.is_none()
    }

    /// A human still in the match whose connection is open.
    pub fn is_connected(&self) -> bool {
        !self.departed && self.link.as_ref().is_some_and(Channel::is_open)
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// The action this combatant brings to an exchange; the defeated bring none.
    pub fn effective_action(&self) -> Option<Action> {
        if self.is_alive() {
            self.action
        } else {
            None
        }
    }

    /// Still owes an action this turn.
    pub fn is_missing_action(&self) -> bool {
        self.is_connected() && self.is_alive() && !self.stunned && self.action.is_none()
    }

    pub fn view(&self) -> CombatantView {
        CombatantView {
            username: self.username.clone(),
            action: action_code(self.effective_action()).to_string(),
            hp: self.hp,
            stunned: self.stunned,
        }
    }

    pub(crate) fn notify<T: serde::Serialize>(&self, name: &str, event: &T) {
        if self.departed {
            return;
        }
        if let Some(link) = &self.link {
            link.notify(name, event);
        }
    }
}

impl std::fmt::Debug for Combatant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Combatant")
            .field("username", &self.username)
            .field("bot", &self.is_bot())
            .field("action", &self.action)
            .field("hp", &self.hp)
            .field("stunned", &self.stunned)
            .field("team", &self.team)
            .field("departed", &self.departed)
            .finish()
    }
}
