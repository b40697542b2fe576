#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

pub mod battle;
pub mod channel;
pub mod config;
pub mod domain;
pub mod error;
pub mod lobby;
pub mod protocol;
pub mod server;

// Re-exports for public API
pub use battle::{Battle, BattleActor, BattleError};
pub use channel::{Channel, ChannelError, ChannelState};
pub use config::{BattleConfig, ChannelConfig, LobbyConfig, ServerConfig};
pub use error::AppError;
pub use lobby::{JoinError, Lobby};

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    arena_test_support::test_logging::init();
}
