//! Physical transports a [`Channel`] can ride on.
//!
//! Each attach function spawns a writer task (outbound frames to the wire)
//! and the channel driver (wire to [`Channel::receive`] plus timers).

use futures_util::{future, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use super::{Channel, Frame};
use crate::config::ChannelConfig;

/// Bind a channel to an accepted WebSocket. The channel starts in
/// `Connecting`; callers decide when to `open()` it.
pub fn attach<S>(socket: WebSocketStream<S>, config: ChannelConfig) -> Channel
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    let channel = Channel::new(config, tx);
    let channel_id = channel.id();

    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                Frame::Text(text) => {
                    if let Err(err) = sink.send(Message::text(text)).await {
                        warn!(%channel_id, error = %err, "[CHANNEL] write failed");
                        break;
                    }
                }
                Frame::Close => {
                    let _ = sink.close().await;
                    break;
                }
            }
        }
        debug!(%channel_id, "[CHANNEL] writer stopped");
    });

    let inbound = stream
        .take_while(|msg| future::ready(matches!(msg, Ok(m) if !m.is_close())))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(text.to_string()),
                Ok(Message::Binary(bytes)) => Some(String::from_utf8_lossy(&bytes).into_owned()),
                _ => None,
            })
        });

    tokio::spawn(channel.clone().run(Box::pin(inbound)));
    channel
}

/// Two channels wired back to back in memory. Both start open with their
/// drivers running; destroying one ends the other.
pub fn memory_pair(left: ChannelConfig, right: ChannelConfig) -> (Channel, Channel) {
    let (left_tx, left_rx) = mpsc::unbounded_channel();
    let (right_tx, right_rx) = mpsc::unbounded_channel();
    let left = Channel::new(left, left_tx);
    let right = Channel::new(right, right_tx);

    tokio::spawn(right.clone().run(Box::pin(text_frames(left_rx))));
    tokio::spawn(left.clone().run(Box::pin(text_frames(right_rx))));

    left.open();
    right.open();
    (left, right)
}

/// Text frames until the first close.
fn text_frames(rx: mpsc::UnboundedReceiver<Frame>) -> impl Stream<Item = String> {
    UnboundedReceiverStream::new(rx)
        .take_while(|frame| future::ready(matches!(frame, Frame::Text(_))))
        .filter_map(|frame| {
            future::ready(match frame {
                Frame::Text(text) => Some(text),
                Frame::Close => None,
            })
        })
}
