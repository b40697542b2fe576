use thiserror::Error;

/// Misuse of a battle by the session layer. Players never see these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BattleError {
    #[error("battle roster is full")]
    Full,
    #[error("battle is no longer forming")]
    NotForming,
    #[error("'{0}' is already in this battle")]
    DuplicateName(String),
    #[error("a battle needs at least {min} combatants, has {have}")]
    NotEnoughPlayers { min: usize, have: usize },
}
