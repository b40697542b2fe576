//! Wire envelope: `{channel, cbid?, data}` as one JSON text frame.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Replies to a correlated request travel on this channel.
pub const REPLY_CHANNEL: &str = "callback";
/// Liveness probes travel on this channel.
pub const PROBE_CHANNEL: &str = "internal";
/// Frames that are not valid envelopes are delivered here as `{message}`.
pub const RAW_CHANNEL: &str = "raw";
/// Terminal notices (`denied`, `retry`) before the server closes.
pub const GLOBAL_CHANNEL: &str = "global";

/// Raised locally when the channel is torn down.
pub const DISCONNECT_EVENT: &str = "disconnect";
/// Raised locally after each completed probe with the round trip in ms.
pub const LATENCY_EVENT: &str = "latency";

/// Events only the channel itself may raise. Never sent to wildcards and
/// never accepted from the peer.
pub fn is_local_event(name: &str) -> bool {
    matches!(name, DISCONNECT_EVENT | LATENCY_EVENT)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cbid: Option<u64>,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(channel: impl Into<String>, cbid: Option<u64>, data: Value) -> Self {
        Self {
            channel: channel.into(),
            cbid,
            data,
        }
    }

    /// Parse an inbound frame. Anything that is not an envelope degrades to a
    /// raw-text payload on [`RAW_CHANNEL`].
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_else(|_| Self::raw(text))
    }

    fn raw(text: &str) -> Self {
        Self::new(RAW_CHANNEL, None, json!({ "message": text }))
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
