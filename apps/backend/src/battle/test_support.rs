//! Fixtures shared by the battle tests: humans wired to in-memory outboxes.

use arena_test_support::frames;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::channel::{Channel, Frame};
use crate::config::{BattleConfig, ChannelConfig};

/// A human's connection plus everything the server wrote to it.
pub struct Seat {
    pub channel: Channel,
    outbox: mpsc::UnboundedReceiver<Frame>,
    seen: Vec<Value>,
}

impl Seat {
    pub fn connect() -> Self {
        let (tx, outbox) = mpsc::unbounded_channel();
        let channel = Channel::new(
            ChannelConfig {
                ping: false,
                ..ChannelConfig::default()
            },
            tx,
        );
        channel.open();
        Self {
            channel,
            outbox,
            seen: Vec::new(),
        }
    }

    /// Every frame received so far, oldest first.
    pub fn frames(&mut self) -> &[Value] {
        while let Ok(frame) = self.outbox.try_recv() {
            if let Frame::Text(text) = frame {
                self.seen.push(frames::decode(&text));
            }
        }
        &self.seen
    }

    pub fn events(&mut self, channel: &str, ev: &str) -> Vec<Value> {
        frames::events(self.frames(), channel, ev)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn event_names(&mut self, channel: &str) -> Vec<String> {
        frames::event_names(self.frames(), channel)
    }

    pub fn last(&mut self, channel: &str, ev: &str) -> Option<Value> {
        self.events(channel, ev).pop()
    }

    pub fn clear(&mut self) {
        self.frames();
        self.seen.clear();
    }
}

pub fn seeded(seed: u64) -> BattleConfig {
    BattleConfig {
        seed: Some(seed),
        ..BattleConfig::default()
    }
}
