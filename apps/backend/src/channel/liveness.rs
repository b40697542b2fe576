//! Liveness timers as one small state machine.
//!
//! While probing, two deadlines run together: `probe_at` issues the next
//! ping and `dead_at` force-closes the connection. A completed round trip
//! re-arms both. With probing disabled a single idle deadline re-arms itself.

use tokio::time::Instant;

use crate::config::ChannelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Stopped,
    Idle {
        rearm_at: Instant,
    },
    Probing {
        /// `None` once the probe for this cycle has been sent.
        probe_at: Option<Instant>,
        dead_at: Instant,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessEvent {
    Quiet,
    SendProbe,
    TimedOut,
}

impl Liveness {
    pub fn schedule(config: &ChannelConfig, now: Instant) -> Self {
        if config.ping {
            Liveness::Probing {
                probe_at: Some(now + config.ping_interval),
                dead_at: now + config.ping_interval + config.ping_timeout,
            }
        } else {
            Liveness::Idle {
                rearm_at: now + config.ping_interval,
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match *self {
            Liveness::Stopped => None,
            Liveness::Idle { rearm_at } => Some(rearm_at),
            Liveness::Probing { probe_at, dead_at } => {
                Some(probe_at.map_or(dead_at, |at| at.min(dead_at)))
            }
        }
    }

    /// Advance to `now` and report what the channel should do.
    pub fn poll(&mut self, config: &ChannelConfig, now: Instant) -> LivenessEvent {
        match self {
            Liveness::Stopped => LivenessEvent::Quiet,
            Liveness::Idle { rearm_at } => {
                if *rearm_at <= now {
                    *rearm_at = now + config.ping_interval;
                }
                LivenessEvent::Quiet
            }
            Liveness::Probing { probe_at, dead_at } => {
                if *dead_at <= now {
                    *self = Liveness::Stopped;
                    return LivenessEvent::TimedOut;
                }
                match *probe_at {
                    Some(at) if at <= now => {
                        *probe_at = None;
                        LivenessEvent::SendProbe
                    }
                    _ => LivenessEvent::Quiet,
                }
            }
        }
    }
}
