/// Hit points every combatant starts a match with.
pub const MAX_HP: u8 = 3;
/// A battle starts once this many combatants have joined.
pub const ROSTER_SIZE: usize = 6;
/// Bots seeded into every new forming battle.
pub const BOT_SLOTS: usize = 4;

/// Split point between team one and team two for a roster of `len`.
///
/// Team one takes the larger half, so a full roster splits 3/3.
pub fn team_split(len: usize) -> usize {
    len.div_ceil(2)
}
