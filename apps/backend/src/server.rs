//! Accept loop: every TCP connection becomes a WebSocket channel bound to
//! the lobby.

use actix::prelude::*;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::channel::transport;
use crate::config::ChannelConfig;
use crate::error::AppError;
use crate::lobby::{session, Connect, Lobby};

/// Serve until the listener fails. Must run inside an actix system.
pub async fn serve(
    listener: TcpListener,
    channel: ChannelConfig,
    lobby: Addr<Lobby>,
) -> Result<(), AppError> {
    info!(addr = %listener.local_addr()?, "[SERVER] listening");
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "[SERVER] accept failed");
                continue;
            }
        };
        debug!(%peer, "[SERVER] connection");
        actix::spawn(handshake(stream, channel.clone(), lobby.clone()));
    }
}

async fn handshake(stream: TcpStream, config: ChannelConfig, lobby: Addr<Lobby>) {
    let socket = match tokio_tungstenite::accept_async(stream).await {
        Ok(socket) => socket,
        Err(err) => {
            debug!(error = %err, "[SERVER] websocket handshake failed");
            return;
        }
    };

    let channel = transport::attach(socket, config);
    if lobby
        .send(Connect {
            link: channel.clone(),
        })
        .await
        .is_err()
    {
        channel.destroy();
        return;
    }
    session::bind(&channel, lobby);
    channel.open();
}
