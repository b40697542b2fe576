//! Arena test support utilities
//!
//! Shared helpers for arena unit and integration tests: unified logging
//! initialization and decoding of outbound channel frames.

pub mod frames;
pub mod test_logging;
