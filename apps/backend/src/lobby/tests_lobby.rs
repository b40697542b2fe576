use actix::prelude::*;
use serde_json::json;

use super::*;
use crate::battle::test_support::{seeded, Seat};
use crate::protocol::BATTLE;

fn lobby() -> Addr<Lobby> {
    Lobby::new(LobbyConfig {
        battle: seeded(21),
        ..LobbyConfig::default()
    })
    .start()
}

async fn connect(lobby: &Addr<Lobby>) -> Seat {
    let seat = Seat::connect();
    lobby
        .send(Connect {
            link: seat.channel.clone(),
        })
        .await
        .unwrap();
    seat
}

async fn enter(lobby: &Addr<Lobby>, seat: &Seat, username: &str) -> Result<(), JoinError> {
    lobby
        .send(EnterBattle {
            id: seat.channel.id(),
            username: username.into(),
        })
        .await
        .unwrap()
}

fn last_size(seat: &mut Seat) -> u64 {
    seat.last(LOBBY, "battlesize").unwrap()["size"]
        .as_u64()
        .unwrap()
}

#[actix::test]
async fn connecting_reports_the_forming_battle_size() {
    let lobby = lobby();
    let mut seat = connect(&lobby).await;

    assert_eq!(
        seat.last(LOBBY, "battlesize").unwrap(),
        json!({ "ev": "battlesize", "size": 4 })
    );

    seat.clear();
    lobby
        .send(GetLobby {
            id: seat.channel.id(),
        })
        .await
        .unwrap();
    assert_eq!(last_size(&mut seat), 4);
}

#[actix::test]
async fn usernames_are_validated() {
    let lobby = lobby();
    let ana = connect(&lobby).await;
    let other = connect(&lobby).await;

    assert_eq!(enter(&lobby, &ana, "   ").await, Err(JoinError::EmptyName));
    assert_eq!(enter(&lobby, &ana, "Bot#2").await, Err(JoinError::NameTaken));
    assert_eq!(enter(&lobby, &ana, "  ana ").await, Ok(()));
    assert_eq!(enter(&lobby, &ana, "ana2").await, Err(JoinError::AlreadyJoined));
    assert_eq!(enter(&lobby, &other, "ana").await, Err(JoinError::NameTaken));

    let stranger = Seat::connect();
    assert_eq!(
        enter(&lobby, &stranger, "zed").await,
        Err(JoinError::UnknownSession)
    );
}

#[actix::test]
async fn long_usernames_are_cut() {
    let lobby = lobby();
    let seat = connect(&lobby).await;
    let long = format!("  {}  ", "x".repeat(40));

    enter(&lobby, &seat, &long).await.unwrap();

    let data = lobby
        .send(BattleDataRequest {
            id: seat.channel.id(),
        })
        .await
        .unwrap();
    assert_eq!(data.username, "x".repeat(30));
    assert!(data.status);
}

#[actix::test]
async fn joining_broadcasts_the_new_size() {
    let lobby = lobby();
    let mut ana = connect(&lobby).await;
    let mut watcher = connect(&lobby).await;

    enter(&lobby, &ana, "ana").await.unwrap();

    assert_eq!(last_size(&mut ana), 5);
    assert_eq!(last_size(&mut watcher), 5);
}

#[actix::test]
async fn a_full_battle_starts_and_a_new_one_forms() {
    let lobby = lobby();
    let mut ana = connect(&lobby).await;
    let mut bob = connect(&lobby).await;

    enter(&lobby, &ana, "ana").await.unwrap();
    enter(&lobby, &bob, "bob").await.unwrap();

    for seat in [&mut ana, &mut bob] {
        assert_eq!(seat.events(LOBBY, "go-battle").len(), 1);
        assert_eq!(seat.events(BATTLE, "start-turn").len(), 1);
        assert_eq!(last_size(seat), 4);
    }

    let data = lobby
        .send(BattleDataRequest {
            id: ana.channel.id(),
        })
        .await
        .unwrap();
    assert!(data.status);
    assert_eq!(data.team1.len(), 3);
    assert_eq!(data.team2.len(), 3);

    // The next forming battle accepts the same name again.
    let mut cleo = connect(&lobby).await;
    assert_eq!(enter(&lobby, &cleo, "ana").await, Ok(()));
    assert_eq!(last_size(&mut cleo), 5);
}

#[actix::test]
async fn submitted_actions_reach_the_players_battle() {
    let lobby = lobby();
    let mut ana = connect(&lobby).await;
    let bob = connect(&lobby).await;
    enter(&lobby, &ana, "ana").await.unwrap();
    enter(&lobby, &bob, "bob").await.unwrap();

    lobby
        .send(SubmitAction {
            id: ana.channel.id(),
            code: "attack".into(),
        })
        .await
        .unwrap();
    // Lets the forwarded message land before looking.
    lobby
        .send(BattleDataRequest {
            id: ana.channel.id(),
        })
        .await
        .unwrap();

    let actions = ana.last(BATTLE, "set-actions").unwrap();
    let mine = actions["actions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["username"] == "ana")
        .cloned()
        .unwrap();
    assert_eq!(mine["flag"], true);
}

#[actix::test]
async fn leaving_frees_the_seat() {
    let lobby = lobby();
    let mut ana = connect(&lobby).await;
    enter(&lobby, &ana, "ana").await.unwrap();
    assert_eq!(last_size(&mut ana), 5);

    lobby
        .send(LeaveBattle {
            id: ana.channel.id(),
        })
        .await
        .unwrap();

    assert_eq!(last_size(&mut ana), 4);
    let data = lobby
        .send(BattleDataRequest {
            id: ana.channel.id(),
        })
        .await
        .unwrap();
    assert_eq!(data, BattleData::absent("ana"));

    assert_eq!(enter(&lobby, &ana, "ana").await, Ok(()));
}

#[actix::test]
async fn disconnecting_forgets_the_player() {
    let lobby = lobby();
    let ana = connect(&lobby).await;
    let mut watcher = connect(&lobby).await;
    enter(&lobby, &ana, "ana").await.unwrap();

    lobby
        .send(Disconnect {
            id: ana.channel.id(),
        })
        .await
        .unwrap();

    assert_eq!(last_size(&mut watcher), 4);
    assert_eq!(
        enter(&lobby, &ana, "ana").await,
        Err(JoinError::UnknownSession)
    );
}

#[actix::test]
async fn disconnecting_mid_match_keeps_the_teams() {
    let lobby = lobby();
    let ana = connect(&lobby).await;
    let bob = connect(&lobby).await;
    enter(&lobby, &ana, "ana").await.unwrap();
    enter(&lobby, &bob, "bob").await.unwrap();

    lobby
        .send(Disconnect {
            id: ana.channel.id(),
        })
        .await
        .unwrap();

    let data = lobby
        .send(BattleDataRequest {
            id: bob.channel.id(),
        })
        .await
        .unwrap();
    assert!(data.status);
    assert_eq!(data.team1.len(), 3);
    assert_eq!(data.team2.len(), 3);
    let names: Vec<&str> = data
        .team1
        .iter()
        .chain(&data.team2)
        .map(|entry| entry.username.as_str())
        .collect();
    assert!(names.contains(&"ana"));
}
