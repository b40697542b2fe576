//! Matches: the turn engine and the actor that gives it a clock.

pub mod actor;
pub mod combatant;
pub mod engine;
pub mod errors;

#[cfg(test)]
pub(crate) mod test_support;

pub use actor::BattleActor;
pub use combatant::{Combatant, Team};
pub use engine::{Battle, Ending, Phase, TurnEnd};
pub use errors::BattleError;
