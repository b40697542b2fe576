//! The strategy matrix: what happens when two committed actions meet.
//!
//! `resolve` is a total function over every `(Option<Action>, Option<Action>)`
//! pair. Effects are listed in the order they are applied and logged.

use super::action::Action;

/// Which participant of a pairing an effect lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Damage { target: Side, amount: u8 },
    Stun { target: Side },
}

use Effect::{Damage, Stun};
use Side::{First, Second};

const NOTHING: &[Effect] = &[];
const HIT_FIRST: &[Effect] = &[Damage { target: First, amount: 2 }];
const HIT_SECOND: &[Effect] = &[Damage { target: Second, amount: 2 }];
const STUN_FIRST: &[Effect] = &[Stun { target: First }];
const STUN_SECOND: &[Effect] = &[Stun { target: Second }];
const TRADE_BLOWS: &[Effect] = &[
    Damage { target: First, amount: 1 },
    Damage { target: Second, amount: 1 },
];
const BURN_FIRST: &[Effect] = &[Damage { target: First, amount: 1 }, Stun { target: First }];
const BURN_SECOND: &[Effect] = &[Damage { target: Second, amount: 1 }, Stun { target: Second }];
const BURN_BOTH: &[Effect] = &[
    Damage { target: First, amount: 1 },
    Stun { target: First },
    Damage { target: Second, amount: 1 },
    Stun { target: Second },
];

/// Effects of `first` meeting `second`.
pub fn resolve(first: Option<Action>, second: Option<Action>) -> &'static [Effect] {
    use Action::{Attack, Defend, Magic};

    match (first, second) {
        (Some(Attack), None) => HIT_SECOND,
        (None, Some(Attack)) => HIT_FIRST,
        (Some(Attack), Some(Attack)) => TRADE_BLOWS,
        (Some(Attack), Some(Defend)) => STUN_FIRST,
        (Some(Attack), Some(Magic)) => BURN_SECOND,

        (Some(Defend), None) => STUN_SECOND,
        (None, Some(Defend)) => STUN_FIRST,
        (Some(Defend), Some(Attack)) => STUN_SECOND,
        (Some(Defend), Some(Defend)) => NOTHING,
        (Some(Defend), Some(Magic)) => STUN_FIRST,

        (Some(Magic), None) => HIT_SECOND,
        (None, Some(Magic)) => HIT_FIRST,
        (Some(Magic), Some(Attack)) => BURN_FIRST,
        (Some(Magic), Some(Defend)) => STUN_SECOND,
        (Some(Magic), Some(Magic)) => BURN_BOTH,

        (None, None) => NOTHING,
    }
}

/// Whether a pairing is recorded in the turn log at all.
pub fn is_logged(first: Option<Action>, second: Option<Action>) -> bool {
    first.is_some() || second.is_some()
}
