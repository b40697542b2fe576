use thiserror::Error;

/// Failures visible to code that sends through a [`Channel`](super::Channel).
///
/// Inbound problems (malformed frames, stale replies, unknown probes) are
/// absorbed by the channel and never produce one of these.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,
    #[error("channel did not open within the allowed wait")]
    OpenTimeout,
    #[error("no reply before the correlation entry was evicted")]
    NoReply,
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}
