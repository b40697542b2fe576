// WebSocket client utilities for testing

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Speaks the envelope protocol by hand, without a `Channel`.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_cbid: u64,
}

impl WsClient {
    pub async fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (stream, _) = connect_async(url).await?;
        Ok(Self {
            stream,
            next_cbid: 1000,
        })
    }

    /// Send an envelope, optionally asking for a reply.
    pub async fn send(
        &mut self,
        channel: &str,
        cbid: Option<u64>,
        data: Value,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut envelope = json!({ "channel": channel, "data": data });
        if let Some(cbid) = cbid {
            envelope["cbid"] = json!(cbid);
        }
        self.stream
            .send(Message::text(envelope.to_string()))
            .await?;
        Ok(())
    }

    /// Send a request and return the correlated `callback` payload.
    pub async fn request(
        &mut self,
        channel: &str,
        data: Value,
        timeout: Duration,
    ) -> Result<Value, Box<dyn std::error::Error>> {
        self.next_cbid += 1;
        let cbid = self.next_cbid;
        self.send(channel, Some(cbid), data).await?;
        let reply = self
            .recv_matching(timeout, |f| f["channel"] == "callback" && f["cbid"] == cbid)
            .await?;
        Ok(reply["data"].clone())
    }

    /// Next frame accepted by `pred`; other frames are skipped.
    pub async fn recv_matching<F>(
        &mut self,
        timeout: Duration,
        pred: F,
    ) -> Result<Value, Box<dyn std::error::Error>>
    where
        F: Fn(&Value) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let msg = tokio::time::timeout_at(deadline, self.stream.next())
                .await
                .map_err(|_| "Timeout waiting for message")?
                .ok_or("Connection closed")??;
            if let Message::Text(text) = msg {
                let frame: Value = serde_json::from_str(&text)?;
                if pred(&frame) {
                    return Ok(frame);
                }
            }
        }
    }

    /// Next event `ev` on `channel`.
    pub async fn recv_event(
        &mut self,
        channel: &str,
        ev: &str,
        timeout: Duration,
    ) -> Result<Value, Box<dyn std::error::Error>> {
        let frame = self
            .recv_matching(timeout, |f| f["channel"] == channel && f["data"]["ev"] == ev)
            .await?;
        Ok(frame["data"].clone())
    }

    /// True once the server has closed the connection.
    pub async fn closed_within(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Err(_) => return false,
                Ok(None) | Ok(Some(Err(_))) => return true,
                Ok(Some(Ok(msg))) if msg.is_close() => return true,
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.stream.close(None).await?;
        Ok(())
    }
}
