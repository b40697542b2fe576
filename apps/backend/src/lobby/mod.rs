//! Session directory: who is connected, which battle is forming, and who is
//! fighting where.
//!
//! The lobby owns the forming battle's address. Each player keeps the address
//! of the battle they joined, so a started match needs no global lookup.

pub mod session;

#[cfg(test)]
mod tests_lobby;

use std::collections::HashMap;

use actix::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::battle::actor::{AddPlayer, GetData, IsFull, SetAction, Size, Start, TryRemove};
use crate::battle::{Battle, BattleActor, BattleError, Combatant};
use crate::channel::Channel;
use crate::config::LobbyConfig;
use crate::protocol::{BattleData, LobbyEvent, LOBBY};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("Choose a username first.")]
    EmptyName,
    #[error("That username is already taken.")]
    NameTaken,
    #[error("You are already in a battle.")]
    AlreadyJoined,
    #[error("Unknown session.")]
    UnknownSession,
    #[error("The battle is not accepting players right now.")]
    Unavailable,
}

impl From<BattleError> for JoinError {
    fn from(err: BattleError) -> Self {
        match err {
            BattleError::DuplicateName(_) => JoinError::NameTaken,
            BattleError::Full | BattleError::NotForming | BattleError::NotEnoughPlayers { .. } => {
                JoinError::Unavailable
            }
        }
    }
}

struct Player {
    username: String,
    link: Channel,
    battle: Option<Addr<BattleActor>>,
}

pub struct Lobby {
    config: LobbyConfig,
    players: HashMap<Uuid, Player>,
    forming: Addr<BattleActor>,
    forming_size: usize,
}

/// Register a freshly opened connection.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub link: Channel,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct GetLobby {
    pub id: Uuid,
}

#[derive(Message)]
#[rtype(result = "Result<(), JoinError>")]
pub struct EnterBattle {
    pub id: Uuid,
    pub username: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct LeaveBattle {
    pub id: Uuid,
}

/// The connection is gone; forget the player.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub id: Uuid,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct SubmitAction {
    pub id: Uuid,
    pub code: String,
}

#[derive(Message)]
#[rtype(result = "BattleData")]
pub struct BattleDataRequest {
    pub id: Uuid,
}

impl Lobby {
    pub fn new(config: LobbyConfig) -> Self {
        let (forming, forming_size) = Self::spawn_battle(&config);
        Self {
            config,
            players: HashMap::new(),
            forming,
            forming_size,
        }
    }

    /// A new forming battle pre-filled with bots.
    fn spawn_battle(config: &LobbyConfig) -> (Addr<BattleActor>, usize) {
        let mut battle = Battle::new(config.battle.clone());
        for slot in 1..=config.bots {
            if let Err(err) = battle.add_player(Combatant::bot(format!("Bot#{slot}"))) {
                warn!(error = %err, "[LOBBY] could not seat bot");
            }
        }
        let size = battle.size();
        debug!(battle_id = %battle.id(), size, "[LOBBY] new forming battle");
        (BattleActor::new(battle).start(), size)
    }

    fn send_size(&self, link: &Channel) {
        link.notify(
            LOBBY,
            LobbyEvent::Battlesize {
                size: self.forming_size,
            },
        );
    }

    fn broadcast_size(&self) {
        for player in self.players.values() {
            self.send_size(&player.link);
        }
    }

    fn clean_username(&self, raw: &str) -> String {
        raw.trim()
            .chars()
            .take(self.config.max_username_chars)
            .collect()
    }

    /// Remove `id` from whatever battle they are in, then refresh the
    /// forming size for everyone.
    fn depart(&mut self, id: Uuid, forget: bool) -> AtomicResponse<Self, ()> {
        let departing = if forget {
            self.players
                .remove(&id)
                .map(|player| (player.username, player.battle))
        } else {
            self.players
                .get_mut(&id)
                .map(|player| (player.username.clone(), player.battle.take()))
        };
        let forming = self.forming.clone();

        let leave = async move {
            if let Some((username, Some(battle))) = departing {
                if let Err(err) = battle.send(TryRemove { username }).await {
                    debug!(error = %err, "[LOBBY] battle already gone");
                }
            }
            forming.send(Size).await.ok()
        };

        AtomicResponse::new(Box::pin(leave.into_actor(self).map(|size, act, _ctx| {
            if let Some(size) = size {
                act.forming_size = size;
            }
            act.broadcast_size();
        })))
    }
}

impl Actor for Lobby {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!(bots = self.config.bots, "[LOBBY] started");
    }
}

impl Handler<Connect> for Lobby {
    type Result = ();

    fn handle(&mut self, msg: Connect, _ctx: &mut Self::Context) {
        let id = msg.link.id();
        debug!(channel_id = %id, "[LOBBY] player connected");
        self.send_size(&msg.link);
        self.players.insert(
            id,
            Player {
                username: String::new(),
                link: msg.link,
                battle: None,
            },
        );
    }
}

impl Handler<GetLobby> for Lobby {
    type Result = ();

    fn handle(&mut self, msg: GetLobby, _ctx: &mut Self::Context) {
        if let Some(player) = self.players.get(&msg.id) {
            self.send_size(&player.link);
        }
    }
}

impl Handler<EnterBattle> for Lobby {
    type Result = AtomicResponse<Self, Result<(), JoinError>>;

    fn handle(&mut self, msg: EnterBattle, _ctx: &mut Self::Context) -> Self::Result {
        let id = msg.id;
        let username = self.clean_username(&msg.username);

        let checked = match self.players.get(&id) {
            None => Err(JoinError::UnknownSession),
            Some(_) if username.is_empty() => Err(JoinError::EmptyName),
            Some(player) if player.battle.as_ref().is_some_and(Addr::connected) => {
                Err(JoinError::AlreadyJoined)
            }
            Some(player) => Ok(player.link.clone()),
        };
        let link = match checked {
            Ok(link) => link,
            Err(err) => {
                debug!(channel_id = %id, error = %err, "[LOBBY] join rejected");
                return AtomicResponse::new(Box::pin(actix::fut::ready(Err(err))));
            }
        };

        let battle = self.forming.clone();
        let name = username.clone();
        let join = async move {
            battle
                .send(AddPlayer(Combatant::human(name, link)))
                .await
                .map_err(|_| JoinError::Unavailable)??;
            let full = battle.send(IsFull).await.map_err(|_| JoinError::Unavailable)?;
            if full {
                if let Err(err) = battle.send(Start).await.map_err(|_| JoinError::Unavailable)? {
                    warn!(error = %err, "[LOBBY] full battle failed to start");
                }
            }
            let size = battle.send(Size).await.map_err(|_| JoinError::Unavailable)?;
            Ok::<_, JoinError>((battle, full, size))
        };

        AtomicResponse::new(Box::pin(join.into_actor(self).map(
            move |joined, act, _ctx| {
                let (battle, full, size) = joined?;
                if let Some(player) = act.players.get_mut(&id) {
                    player.username = username;
                    player.battle = Some(battle);
                }
                if full {
                    info!("[LOBBY] battle full, forming a new one");
                    let (forming, size) = Self::spawn_battle(&act.config);
                    act.forming = forming;
                    act.forming_size = size;
                } else {
                    act.forming_size = size;
                }
                act.broadcast_size();
                Ok(())
            },
        )))
    }
}

impl Handler<LeaveBattle> for Lobby {
    type Result = AtomicResponse<Self, ()>;

    fn handle(&mut self, msg: LeaveBattle, _ctx: &mut Self::Context) -> Self::Result {
        self.depart(msg.id, false)
    }
}

impl Handler<Disconnect> for Lobby {
    type Result = AtomicResponse<Self, ()>;

    fn handle(&mut self, msg: Disconnect, _ctx: &mut Self::Context) -> Self::Result {
        debug!(channel_id = %msg.id, "[LOBBY] player disconnected");
        self.depart(msg.id, true)
    }
}

impl Handler<SubmitAction> for Lobby {
    type Result = ();

    fn handle(&mut self, msg: SubmitAction, _ctx: &mut Self::Context) {
        let Some(player) = self.players.get(&msg.id) else {
            return;
        };
        if let Some(battle) = &player.battle {
            battle.do_send(SetAction {
                username: player.username.clone(),
                code: msg.code,
            });
        }
    }
}

impl Handler<BattleDataRequest> for Lobby {
    type Result = ResponseFuture<BattleData>;

    fn handle(&mut self, msg: BattleDataRequest, _ctx: &mut Self::Context) -> Self::Result {
        let (username, battle) = match self.players.get(&msg.id) {
            Some(player) => (player.username.clone(), player.battle.clone()),
            None => (String::new(), None),
        };
        Box::pin(async move {
            match battle {
                Some(battle) => battle
                    .send(GetData {
                        username: username.clone(),
                    })
                    .await
                    .unwrap_or_else(|_| BattleData::absent(username)),
                None => BattleData::absent(username),
            }
        })
    }
}
