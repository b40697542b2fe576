#![allow(dead_code)]

// tests/common/mod.rs
use std::time::Duration;

use arena::ChannelConfig;

// Logging is auto-installed for every test binary
#[ctor::ctor]
fn init_logging() {
    arena_test_support::test_logging::init();
}

/// Channel settings for tests that are not about liveness.
pub fn quiet_channel() -> ChannelConfig {
    ChannelConfig {
        ping: false,
        ..ChannelConfig::default()
    }
}

/// Channel settings with a probe every `interval`.
pub fn probing_channel(interval: Duration) -> ChannelConfig {
    ChannelConfig {
        ping_interval: interval,
        ping_timeout: interval * 10,
        ..ChannelConfig::default()
    }
}
