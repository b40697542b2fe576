//! Helpers for asserting on outbound channel frames.
//!
//! Frames are the JSON text written by a channel: `{channel, cbid?, data}`.
//! These helpers work on plain strings so they stay independent of the arena
//! crate's types.

use serde_json::Value;

/// Decode a single frame, panicking with the offending text on failure.
pub fn decode(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|err| panic!("frame is not JSON ({err}): {text}"))
}

/// Decode every frame in order.
pub fn decode_all<I, S>(texts: I) -> Vec<Value>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    texts.into_iter().map(|t| decode(t.as_ref())).collect()
}

/// Payloads of frames sent on `channel` whose `data.ev` equals `ev`.
pub fn events<'a>(frames: &'a [Value], channel: &str, ev: &str) -> Vec<&'a Value> {
    frames
        .iter()
        .filter(|f| f["channel"] == channel && f["data"]["ev"] == ev)
        .map(|f| &f["data"])
        .collect()
}

/// Sequence of `data.ev` values sent on `channel`, in order.
pub fn event_names(frames: &[Value], channel: &str) -> Vec<String> {
    frames
        .iter()
        .filter(|f| f["channel"] == channel)
        .filter_map(|f| f["data"]["ev"].as_str().map(str::to_owned))
        .collect()
}
