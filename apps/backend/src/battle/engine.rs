//! The turn engine: one match from forming to its ending.
//!
//! Pure state machine. Timers live in [`super::actor::BattleActor`], which
//! feeds ticks and bot releases back in tagged with the turn they were
//! scheduled for. Each turn carries a single `collecting` guard, so whichever
//! path reaches resolution first wins and every later attempt is a no-op.

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use uuid::Uuid;

use super::combatant::{Combatant, Team};
use super::errors::BattleError;
use crate::config::BattleConfig;
use crate::domain::resolution::is_logged;
use crate::domain::rules::team_split;
use crate::domain::{resolve, Action, Effect, Side};
use crate::protocol::{
    BattleData, BattleEvent, Commitment, LobbyEvent, LogEntry, MatchResult, RosterEntry, BATTLE,
    LOBBY,
};

/// Fewest combatants a match can start with.
pub const MIN_COMBATANTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    Winner(Team),
    /// Both teams fell in the same exchange.
    Draw,
    /// No connected human was left to play for.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Forming,
    Running,
    Ended(Ending),
}

/// What the driver must schedule after a turn stopped collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEnd {
    NextTurn,
    MatchOver(Ending),
}

pub struct Battle {
    id: Uuid,
    config: BattleConfig,
    roster: Vec<Combatant>,
    phase: Phase,
    turn: u32,
    timer: u32,
    collecting: bool,
    bots_ready: bool,
    last_log: Vec<LogEntry>,
    rng: StdRng,
}

impl Battle {
    pub fn new(config: BattleConfig) -> Self {
        let rng = if let Some(seed) = config.seed {
            StdRng::seed_from_u64(seed)
        } else {
            StdRng::from_os_rng()
        };
        Self {
            id: Uuid::new_v4(),
            config,
            roster: Vec::new(),
            phase: Phase::Forming,
            turn: 0,
            timer: 0,
            collecting: false,
            bots_ready: false,
            last_log: Vec::new(),
            rng,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn size(&self) -> usize {
        self.roster.len()
    }

    pub fn is_full(&self) -> bool {
        self.roster.len() >= self.config.roster_size
    }

    /// Current turn number; zero before the first turn.
    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn timer(&self) -> u32 {
        self.timer
    }

    pub fn combatant(&self, username: &str) -> Option<&Combatant> {
        self.roster.iter().find(|c| c.username == username)
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.roster
    }

    pub fn last_turn_log(&self) -> &[LogEntry] {
        &self.last_log
    }

    pub fn add_player(&mut self, combatant: Combatant) -> Result<(), BattleError> {
        if self.phase != Phase::Forming {
            return Err(BattleError::NotForming);
        }
        if self.is_full() {
            return Err(BattleError::Full);
        }
        if self.combatant(&combatant.username).is_some() {
            return Err(BattleError::DuplicateName(combatant.username));
        }
        debug!(battle_id = %self.id, username = %combatant.username, bot = combatant.is_bot(), "[BATTLE] joined");
        self.roster.push(combatant);
        Ok(())
    }

    /// Take `username` out of the match. A forming battle frees the seat.
    /// Once started the combatant stays on its team with its hit points but
    /// stops acting and receiving events, so it is still paired until it
    /// falls. Aborts a running match once no connected human remains;
    /// otherwise the departure may let the turn resolve early.
    pub fn try_remove(&mut self, username: &str) -> Option<TurnEnd> {
        if self.phase == Phase::Forming {
            let before = self.roster.len();
            self.roster.retain(|c| c.username != username);
            if self.roster.len() != before {
                debug!(battle_id = %self.id, username, "[BATTLE] left before start");
            }
            return None;
        }

        let combatant = self
            .roster
            .iter_mut()
            .find(|c| c.username == username && !c.departed)?;
        combatant.departed = true;
        debug!(battle_id = %self.id, username, hp = combatant.hp, "[BATTLE] left mid-match");

        if !self.is_running() {
            return None;
        }
        if !self.has_connected_human() {
            return Some(self.abort());
        }
        self.check_resolution()
    }

    /// Leave `Forming`: shuffle, split teams, restore HP and open turn one.
    /// Returns the first turn number, or `None` when there is nobody to play
    /// for and the match was aborted on the spot.
    pub fn start(&mut self) -> Result<Option<u32>, BattleError> {
        if self.phase != Phase::Forming {
            return Err(BattleError::NotForming);
        }
        if self.roster.len() < MIN_COMBATANTS {
            return Err(BattleError::NotEnoughPlayers {
                min: MIN_COMBATANTS,
                have: self.roster.len(),
            });
        }

        self.phase = Phase::Running;
        self.roster.shuffle(&mut self.rng);
        let split = team_split(self.roster.len());
        for (seat, combatant) in self.roster.iter_mut().enumerate() {
            combatant.hp = self.config.max_hp;
            combatant.stunned = false;
            combatant.action = None;
            combatant.team = Some(if seat < split { Team::One } else { Team::Two });
        }
        info!(battle_id = %self.id, size = self.roster.len(), "[BATTLE] started");

        for combatant in &self.roster {
            combatant.notify(LOBBY, &LobbyEvent::GoBattle);
        }
        Ok(self.begin_turn())
    }

    /// Open the next turn. `None` when the match is over or was aborted
    /// because every human is gone.
    pub fn begin_turn(&mut self) -> Option<u32> {
        if !self.is_running() {
            return None;
        }
        if !self.has_connected_human() {
            self.abort();
            return None;
        }

        self.turn += 1;
        self.timer = self.config.turn_ticks;
        self.collecting = true;
        self.bots_ready = false;
        // Stun only costs the remainder of the turn it landed in; every turn
        // starts with a clean slate, so `start-turn` always reports false.
        for combatant in &mut self.roster {
            combatant.action = None;
            combatant.stunned = false;
        }
        for combatant in &self.roster {
            combatant.notify(
                BATTLE,
                &BattleEvent::StartTurn {
                    timer: self.timer,
                    hp: combatant.hp,
                    stunned: combatant.stunned,
                },
            );
        }
        debug!(battle_id = %self.id, turn = self.turn, "[BATTLE] turn started");
        Some(self.turn)
    }

    /// One countdown step for `turn`; hitting zero forces resolution.
    pub fn tick(&mut self, turn: u32) -> Option<TurnEnd> {
        if !self.is_collecting(turn) {
            return None;
        }
        self.timer = self.timer.saturating_sub(1);
        if self.timer == 0 {
            debug!(battle_id = %self.id, turn, "[BATTLE] countdown expired");
            return self.resolve();
        }
        None
    }

    /// End of the bot grace period for `turn`: every living bot commits a
    /// random action, then the turn may resolve early.
    pub fn release_bots(&mut self, turn: u32) -> Option<TurnEnd> {
        if !self.is_collecting(turn) {
            return None;
        }
        self.bots_ready = true;

        let mut submitted = false;
        for seat in 0..self.roster.len() {
            let combatant = &self.roster[seat];
            if !combatant.is_bot() || !self.accepts(combatant) {
                continue;
            }
            let action = Action::ALL[self.rng.random_range(0..Action::ALL.len())];
            self.roster[seat].action = Some(action);
            submitted = true;
        }
        if submitted {
            self.broadcast_commitments();
        }
        self.check_resolution()
    }

    /// Record a human's action for the current turn. Rejections are silent.
    pub fn set_action(&mut self, username: &str, code: &str) -> Option<TurnEnd> {
        let action = match code.parse::<Action>() {
            Ok(action) => action,
            Err(err) => {
                debug!(battle_id = %self.id, username, error = %err, "[BATTLE] action ignored");
                return None;
            }
        };
        let seat = self.roster.iter().position(|c| c.username == username)?;
        if !self.accepts(&self.roster[seat]) {
            debug!(battle_id = %self.id, username, "[BATTLE] submission rejected");
            return None;
        }

        self.roster[seat].action = Some(action);
        self.broadcast_commitments();
        if self.roster[seat].is_bot() {
            return None;
        }
        self.check_resolution()
    }

    /// Resolve now if the bots have acted and no connected, living, unstunned
    /// human still owes an action.
    pub fn check_resolution(&mut self) -> Option<TurnEnd> {
        if !self.is_running() || !self.collecting || !self.bots_ready {
            return None;
        }
        if self.roster.iter().any(Combatant::is_missing_action) {
            return None;
        }
        self.resolve()
    }

    /// Run the exchanges for the current turn. At most once per turn.
    pub fn resolve(&mut self) -> Option<TurnEnd> {
        if !self.is_running() || !self.collecting {
            return None;
        }
        self.collecting = false;
        self.broadcast(&BattleEvent::LockAction);

        let mut first = self.living(Team::One);
        let mut second = self.living(Team::Two);
        first.shuffle(&mut self.rng);
        second.shuffle(&mut self.rng);
        let (longer, shorter) = if first.len() > second.len() {
            (first, second)
        } else {
            (second, first)
        };

        let mut log = Vec::new();
        for (index, &p1) in longer.iter().enumerate() {
            let p2 = match shorter.get(index) {
                Some(&p2) => p2,
                None => match shorter.choose(&mut self.rng) {
                    Some(&p2) => p2,
                    None => break,
                },
            };
            self.exchange(p1, p2, &mut log);
        }

        self.last_log = log.clone();
        self.broadcast(&BattleEvent::TurnResult { log });

        let outcome = self.outcome();
        if let TurnEnd::MatchOver(ending) = outcome {
            self.phase = Phase::Ended(ending);
            info!(battle_id = %self.id, turn = self.turn, ending = ?ending, "[BATTLE] ended");
        }
        Some(outcome)
    }

    /// Tell every combatant whether their team survived.
    pub fn announce_result(&self, ending: Ending) {
        let winner = match ending {
            Ending::Winner(team) => Some(team),
            Ending::Draw => None,
            Ending::Aborted => return,
        };
        for combatant in &self.roster {
            let result = if winner.is_some() && combatant.team == winner {
                MatchResult::Won
            } else {
                MatchResult::Lost
            };
            combatant.notify(BATTLE, &BattleEvent::EndGame { result });
        }
    }

    pub fn data(&self, viewer: &str) -> BattleData {
        BattleData {
            status: true,
            timer: self.timer,
            team1: self.roster_of(Team::One),
            team2: self.roster_of(Team::Two),
            username: viewer.to_string(),
        }
    }

    fn is_collecting(&self, turn: u32) -> bool {
        self.is_running() && self.collecting && self.turn == turn
    }

    fn accepts(&self, combatant: &Combatant) -> bool {
        self.is_running()
            && self.collecting
            && !combatant.departed
            && combatant.is_alive()
            && !combatant.stunned
    }

    fn has_connected_human(&self) -> bool {
        self.roster.iter().any(Combatant::is_connected)
    }

    fn abort(&mut self) -> TurnEnd {
        self.collecting = false;
        self.phase = Phase::Ended(Ending::Aborted);
        info!(battle_id = %self.id, turn = self.turn, "[BATTLE] aborted, no connected players left");
        TurnEnd::MatchOver(Ending::Aborted)
    }

    fn living(&self, team: Team) -> Vec<usize> {
        self.roster
            .iter()
            .enumerate()
            .filter(|(_, c)| c.team == Some(team) && c.is_alive())
            .map(|(seat, _)| seat)
            .collect()
    }

    fn roster_of(&self, team: Team) -> Vec<RosterEntry> {
        self.roster
            .iter()
            .filter(|c| c.team == Some(team))
            .map(|c| RosterEntry {
                username: c.username.clone(),
            })
            .collect()
    }

    fn exchange(&mut self, p1: usize, p2: usize, log: &mut Vec<LogEntry>) {
        let first = self.roster[p1].effective_action();
        let second = self.roster[p2].effective_action();
        if !is_logged(first, second) {
            return;
        }

        log.push(LogEntry::Match {
            p1: self.roster[p1].view(),
            p2: self.roster[p2].view(),
        });
        for effect in resolve(first, second) {
            let entry = match *effect {
                Effect::Damage { target, amount } => {
                    let target = &mut self.roster[pick(target, p1, p2)];
                    target.hp = target.hp.saturating_sub(amount);
                    LogEntry::Damage {
                        player: target.username.clone(),
                        amount,
                        newhp: target.hp,
                    }
                }
                Effect::Stun { target } => {
                    let target = &mut self.roster[pick(target, p1, p2)];
                    target.stunned = true;
                    LogEntry::Stun {
                        player: target.username.clone(),
                    }
                }
            };
            log.push(entry);
        }
        log.push(LogEntry::Update {
            p1: self.roster[p1].view(),
            p2: self.roster[p2].view(),
        });
    }

    fn outcome(&self) -> TurnEnd {
        let alive = |team| {
            self.roster
                .iter()
                .any(|c| c.team == Some(team) && c.is_alive())
        };
        match (alive(Team::One), alive(Team::Two)) {
            (true, true) => TurnEnd::NextTurn,
            (true, false) => TurnEnd::MatchOver(Ending::Winner(Team::One)),
            (false, true) => TurnEnd::MatchOver(Ending::Winner(Team::Two)),
            (false, false) => TurnEnd::MatchOver(Ending::Draw),
        }
    }

    fn broadcast(&self, event: &BattleEvent) {
        for combatant in &self.roster {
            combatant.notify(BATTLE, event);
        }
    }

    fn broadcast_commitments(&self) {
        let actions = self
            .roster
            .iter()
            .map(|c| Commitment {
                username: c.username.clone(),
                flag: c.action.is_some(),
                action: String::new(),
            })
            .collect();
        self.broadcast(&BattleEvent::SetActions { actions });
    }
}

fn pick(side: Side, p1: usize, p2: usize) -> usize {
    match side {
        Side::First => p1,
        Side::Second => p2,
    }
}
