//! Wires one connection's named channels to the lobby.

use actix::Addr;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    BattleDataRequest, Disconnect, EnterBattle, GetLobby, LeaveBattle, Lobby, SubmitAction,
};
use crate::channel::{Channel, Responder, DISCONNECT_EVENT};
use crate::protocol::{BattleRequest, JoinReply, LobbyRequest, BATTLE, LOBBY};

/// Register the lobby and battle handlers for `channel`. Call after the
/// lobby has been told about the connection.
pub fn bind(channel: &Channel, lobby: Addr<Lobby>) {
    let id = channel.id();

    {
        let lobby = lobby.clone();
        channel.on(LOBBY, move |data, responder| {
            if let Some(request) = parse::<LobbyRequest>(id, LOBBY, data) {
                on_lobby(id, &lobby, request, responder);
            }
        });
    }
    {
        let lobby = lobby.clone();
        channel.on(BATTLE, move |data, responder| {
            if let Some(request) = parse::<BattleRequest>(id, BATTLE, data) {
                on_battle(id, &lobby, request, responder);
            }
        });
    }
    channel.on(DISCONNECT_EVENT, move |_, _| {
        lobby.do_send(Disconnect { id });
    });
}

fn parse<T: DeserializeOwned>(id: Uuid, name: &str, data: Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(request) => Some(request),
        Err(err) => {
            debug!(channel_id = %id, channel_name = name, error = %err, "[SESSION] ignoring request");
            None
        }
    }
}

fn on_lobby(id: Uuid, lobby: &Addr<Lobby>, request: LobbyRequest, responder: Responder) {
    match request {
        LobbyRequest::GetLobby => lobby.do_send(GetLobby { id }),
        LobbyRequest::EnterBattle { username } => {
            let lobby = lobby.clone();
            tokio::spawn(async move {
                let reply = match lobby.send(EnterBattle { id, username }).await {
                    Ok(Ok(())) => JoinReply::accepted(),
                    Ok(Err(err)) => JoinReply::rejected(err),
                    Err(err) => {
                        warn!(channel_id = %id, error = %err, "[SESSION] lobby unavailable");
                        JoinReply::rejected(super::JoinError::Unavailable)
                    }
                };
                responder.send(reply);
            });
        }
        LobbyRequest::LeaveBattle => {
            let lobby = lobby.clone();
            tokio::spawn(async move {
                if let Err(err) = lobby.send(LeaveBattle { id }).await {
                    warn!(channel_id = %id, error = %err, "[SESSION] lobby unavailable");
                }
                responder.send(json!({}));
            });
        }
    }
}

fn on_battle(id: Uuid, lobby: &Addr<Lobby>, request: BattleRequest, responder: Responder) {
    match request {
        BattleRequest::GetData => {
            let lobby = lobby.clone();
            tokio::spawn(async move {
                match lobby.send(BattleDataRequest { id }).await {
                    Ok(data) => responder.send(data),
                    Err(err) => {
                        warn!(channel_id = %id, error = %err, "[SESSION] lobby unavailable");
                        responder.send(json!({ "status": false }));
                    }
                }
            });
        }
        BattleRequest::SetAction { code } => {
            lobby.do_send(SubmitAction { id, code });
            responder.send(json!({}));
        }
    }
}
