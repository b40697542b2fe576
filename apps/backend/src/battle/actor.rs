use actix::prelude::*;
use tracing::{debug, info, warn};

use super::combatant::Combatant;
use super::engine::{Battle, Ending, Phase, TurnEnd};
use super::errors::BattleError;
use crate::protocol::BattleData;

/// Drives one [`Battle`]: owns its timers and serializes every mutation.
///
/// Timer callbacks carry the turn they were scheduled for; the engine ignores
/// the ones that belong to a turn that already resolved.
pub struct BattleActor {
    battle: Battle,
    countdown: Option<SpawnHandle>,
}

#[derive(Message)]
#[rtype(result = "Result<(), BattleError>")]
pub struct AddPlayer(pub Combatant);

#[derive(Message)]
#[rtype(result = "()")]
pub struct TryRemove {
    pub username: String,
}

#[derive(Message)]
#[rtype(result = "bool")]
pub struct IsFull;

#[derive(Message)]
#[rtype(result = "usize")]
pub struct Size;

#[derive(Message)]
#[rtype(result = "Result<(), BattleError>")]
pub struct Start;

#[derive(Message)]
#[rtype(result = "()")]
pub struct SetAction {
    pub username: String,
    pub code: String,
}

#[derive(Message)]
#[rtype(result = "BattleData")]
pub struct GetData {
    pub username: String,
}

#[derive(Message)]
#[rtype(result = "Phase")]
pub struct GetPhase;

impl BattleActor {
    pub fn new(battle: Battle) -> Self {
        Self {
            battle,
            countdown: None,
        }
    }

    fn schedule_turn(&mut self, turn: u32, ctx: &mut Context<Self>) {
        self.cancel_countdown(ctx);
        let config = self.battle.config();
        let (tick, bot_grace) = (config.tick, config.bot_grace);

        self.countdown = Some(ctx.run_interval(tick, move |actor, ctx| {
            let end = actor.battle.tick(turn);
            actor.after(end, ctx);
        }));
        ctx.run_later(bot_grace, move |actor, ctx| {
            let end = actor.battle.release_bots(turn);
            actor.after(end, ctx);
        });
    }

    /// React to a turn that stopped collecting.
    fn after(&mut self, end: Option<TurnEnd>, ctx: &mut Context<Self>) {
        let Some(end) = end else {
            return;
        };
        self.cancel_countdown(ctx);
        let delay = self.battle.config().post_turn_delay;

        match end {
            TurnEnd::NextTurn => {
                ctx.run_later(delay, |actor, ctx| {
                    match actor.battle.begin_turn() {
                        Some(turn) => actor.schedule_turn(turn, ctx),
                        None => ctx.stop(),
                    }
                });
            }
            TurnEnd::MatchOver(Ending::Aborted) => ctx.stop(),
            TurnEnd::MatchOver(ending) => {
                ctx.run_later(delay, move |actor, ctx| {
                    actor.battle.announce_result(ending);
                    ctx.stop();
                });
            }
        }
    }

    fn cancel_countdown(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.countdown.take() {
            ctx.cancel_future(handle);
        }
    }
}

impl Actor for BattleActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        debug!(battle_id = %self.battle.id(), size = self.battle.size(), "[BATTLE] actor started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(battle_id = %self.battle.id(), phase = ?self.battle.phase(), "[BATTLE] actor stopped");
    }
}

impl Handler<AddPlayer> for BattleActor {
    type Result = Result<(), BattleError>;

    fn handle(&mut self, msg: AddPlayer, _ctx: &mut Self::Context) -> Self::Result {
        self.battle.add_player(msg.0)
    }
}

impl Handler<TryRemove> for BattleActor {
    type Result = ();

    fn handle(&mut self, msg: TryRemove, ctx: &mut Self::Context) {
        let end = self.battle.try_remove(&msg.username);
        self.after(end, ctx);
    }
}

impl Handler<IsFull> for BattleActor {
    type Result = bool;

    fn handle(&mut self, _msg: IsFull, _ctx: &mut Self::Context) -> bool {
        self.battle.is_full()
    }
}

impl Handler<Size> for BattleActor {
    type Result = usize;

    fn handle(&mut self, _msg: Size, _ctx: &mut Self::Context) -> usize {
        self.battle.size()
    }
}

impl Handler<Start> for BattleActor {
    type Result = Result<(), BattleError>;

    fn handle(&mut self, _msg: Start, ctx: &mut Self::Context) -> Self::Result {
        match self.battle.start()? {
            Some(turn) => self.schedule_turn(turn, ctx),
            None => {
                warn!(battle_id = %self.battle.id(), "[BATTLE] started without connected players");
                ctx.stop();
            }
        }
        Ok(())
    }
}

impl Handler<SetAction> for BattleActor {
    type Result = ();

    fn handle(&mut self, msg: SetAction, ctx: &mut Self::Context) {
        let end = self.battle.set_action(&msg.username, &msg.code);
        self.after(end, ctx);
    }
}

impl Handler<GetData> for BattleActor {
    type Result = MessageResult<GetData>;

    fn handle(&mut self, msg: GetData, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.battle.data(&msg.username))
    }
}

impl Handler<GetPhase> for BattleActor {
    type Result = MessageResult<GetPhase>;

    fn handle(&mut self, _msg: GetPhase, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.battle.phase())
    }
}
