//! Domain layer: pure battle rules, free of timers and connections.

pub mod action;
pub mod errors;
pub mod resolution;
pub mod rules;

#[cfg(test)]
pub(crate) mod test_prelude;

// Re-exports for ergonomics
pub use action::{action_code, Action};
pub use errors::DomainError;
pub use resolution::{resolve, Effect, Side};
