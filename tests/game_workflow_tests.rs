use std::time::Duration;

use fourwins::game::GameSnapshot;
use fourwins::messages::{MessageType, MoveDonePayload, ReconnectedPayload, TurnOfPayload};

mod utils;

use utils::*;

/// Drives the full lobby flow up to a started match and returns
/// (game_id, access_token).
async fn start_match(
    setup: &TestSetup,
    alice: &mut TestClient,
    bob: &mut TestClient,
) -> (String, String) {
    setup.send_challenge("alice", "bob").await;
    let forwarded = bob.expect_message(MessageType::ForwardChallenge).await;
    let challenge = forwarded.payload.get("challenge").unwrap().clone();
    setup.send_challenge_answer("bob", &challenge, true).await;

    let created = alice.expect_message(MessageType::MatchCreated).await;
    let game_id = created
        .payload
        .get("game_id")
        .unwrap()
        .as_str()
        .unwrap()
        .to_string();
    let access_token = created
        .payload
        .get("access_token")
        .unwrap()
        .as_str()
        .unwrap()
        .to_string();

    setup.send_verify("alice", &game_id, &access_token).await;
    setup.send_verify("bob", &game_id, &access_token).await;
    alice.expect_message(MessageType::TurnOf).await;
    bob.expect_message(MessageType::TurnOf).await;

    (game_id, access_token)
}

#[tokio::test]
async fn test_moves_are_broadcast_and_turns_rotate() {
    let setup = TestSetup::new();
    let mut alice = setup.connect("alice").await;
    let mut bob = setup.connect("bob").await;
    let (game_id, token) = start_match(&setup, &mut alice, &mut bob).await;

    setup.send_move("alice", &game_id, &token, 3).await;

    for client in [&mut alice, &mut bob] {
        let done = client.expect_message(MessageType::MoveDone).await;
        let payload: MoveDonePayload = serde_json::from_value(done.payload).unwrap();
        assert_eq!(payload.player, "alice");
        assert_eq!(payload.column, 3);
        assert_eq!(payload.row, 5);

        let turn = client.expect_message(MessageType::TurnOf).await;
        let payload: TurnOfPayload = serde_json::from_value(turn.payload).unwrap();
        assert_eq!(payload.player, "bob");
    }

    setup.send_move("bob", &game_id, &token, 3).await;
    let done = alice.expect_message(MessageType::MoveDone).await;
    let payload: MoveDonePayload = serde_json::from_value(done.payload).unwrap();
    assert_eq!(payload.player, "bob");
    assert_eq!(payload.row, 4);
}

#[tokio::test]
async fn test_out_of_turn_move_only_warns_the_caller() {
    let setup = TestSetup::new();
    let mut alice = setup.connect("alice").await;
    let mut bob = setup.connect("bob").await;
    let (game_id, token) = start_match(&setup, &mut alice, &mut bob).await;
    alice.drain();
    bob.drain();

    setup.send_move("bob", &game_id, &token, 0).await;

    bob.expect_message(MessageType::Warning).await;
    alice.assert_no_message_of_type(MessageType::MoveDone);
}

#[tokio::test]
async fn test_stacking_four_wins_and_closes_the_game() {
    let setup = TestSetup::new();
    let mut alice = setup.connect("alice").await;
    let mut bob = setup.connect("bob").await;
    let mut carol = setup.connect("carol").await;
    let (game_id, token) = start_match(&setup, &mut alice, &mut bob).await;

    // Alice stacks column 0; the fourth mark lands on row 2 and wins.
    for _ in 0..3 {
        setup.send_move("alice", &game_id, &token, 0).await;
        setup.send_move("bob", &game_id, &token, 6).await;
    }
    setup.send_move("alice", &game_id, &token, 0).await;

    let winner = alice.expect_message(MessageType::Winner).await;
    assert_eq!(
        winner.payload.get("player").unwrap().as_str().unwrap(),
        "alice"
    );
    bob.expect_message(MessageType::Winner).await;

    alice.expect_message(MessageType::GameClosed).await;
    bob.expect_message(MessageType::GameClosed).await;
    assert!(setup.app.games.is_empty().await);

    // The lobby's game list loses the match on the next flush. The first
    // UPDATE_GAME_LIST carol sees may still be the creation event.
    let mut saw_removal = false;
    for _ in 0..2 {
        let update = carol.expect_message(MessageType::UpdateGameList).await;
        if update.payload.get("removed_game_id").is_some() {
            saw_removal = true;
            break;
        }
    }
    assert!(saw_removal, "carol should see the game-removed update");
}

#[tokio::test]
async fn test_turn_timeout_nudges_without_changing_state() {
    let setup = TestSetup::new();
    let mut alice = setup.connect("alice").await;
    let mut bob = setup.connect("bob").await;
    let game = setup.insert_match(Duration::from_millis(50)).await;

    setup.send_verify("alice", &game.id, &game.access_token).await;
    setup.send_verify("bob", &game.id, &game.access_token).await;
    alice.expect_message(MessageType::TurnOf).await;

    // Alice is the current player; only bob is nudged, repeatedly.
    bob.expect_message(MessageType::TurnOver).await;
    bob.expect_message(MessageType::TurnOver).await;

    alice.assert_no_message_of_type(MessageType::TurnOver);
    assert!(setup.app.games.exists(&game.id).await);
}

#[tokio::test]
async fn test_spectator_replays_the_log_and_follows_live() {
    let setup = TestSetup::new();
    let mut alice = setup.connect("alice").await;
    let mut bob = setup.connect("bob").await;
    let mut carol = setup.connect("carol").await;
    let (game_id, token) = start_match(&setup, &mut alice, &mut bob).await;

    setup.send_move("alice", &game_id, &token, 2).await;

    setup
        .send(
            "carol",
            serde_json::json!({
                "type": "ADD_CLIENT_AS_SPECTATOR",
                "payload": { "game_id": game_id },
                "meta": null,
            }),
        )
        .await;

    let watching = carol.expect_message(MessageType::IsWatching).await;
    let snapshot: GameSnapshot = serde_json::from_value(watching.payload).unwrap();
    assert_eq!(snapshot.players, vec!["alice".to_string(), "bob".to_string()]);
    assert_eq!(snapshot.moves.len(), 1);
    assert_eq!(snapshot.moves[0].column, 2);

    // Spectators follow subsequent moves live but cannot make any.
    setup.send_move("bob", &game_id, &token, 4).await;
    carol.expect_message(MessageType::MoveDone).await;

    setup.send_move("carol", &game_id, &token, 1).await;
    carol.expect_message(MessageType::Warning).await;
}

#[tokio::test]
async fn test_player_reconnects_into_a_running_match() {
    let setup = TestSetup::new();
    let mut alice = setup.connect("alice").await;
    let mut bob = setup.connect("bob").await;
    let (game_id, token) = start_match(&setup, &mut alice, &mut bob).await;

    setup.send_move("alice", &game_id, &token, 0).await;

    setup.disconnect("bob").await;
    let mut bob = setup.connect("bob").await;

    setup
        .send(
            "bob",
            serde_json::json!({
                "type": "RECONNECT_PLAYER",
                "payload": { "game_id": game_id },
                "meta": null,
            }),
        )
        .await;

    let watching = bob.expect_message(MessageType::IsWatching).await;
    let snapshot: GameSnapshot = serde_json::from_value(watching.payload).unwrap();
    assert_eq!(snapshot.moves.len(), 1);

    let reconnected = bob.expect_message(MessageType::ReconnectedOn).await;
    let payload: ReconnectedPayload = serde_json::from_value(reconnected.payload).unwrap();
    assert!(payload.is_player);
    assert!(payload.is_current_player);

    // The rejoined player takes their move as usual.
    setup.send_move("bob", &game_id, &token, 1).await;
    alice.expect_message(MessageType::MoveDone).await;
}

#[tokio::test]
async fn test_player_closes_the_game_for_the_whole_group() {
    let setup = TestSetup::new();
    let mut alice = setup.connect("alice").await;
    let mut bob = setup.connect("bob").await;
    let (game_id, token) = start_match(&setup, &mut alice, &mut bob).await;

    setup
        .send(
            "alice",
            serde_json::json!({
                "type": "CLOSE_GAME",
                "payload": { "game_id": game_id, "access_token": token },
                "meta": null,
            }),
        )
        .await;

    alice.expect_message(MessageType::GameClosed).await;
    bob.expect_message(MessageType::GameClosed).await;
    assert!(setup.app.games.is_empty().await);
}

#[tokio::test]
async fn test_closing_without_the_token_is_rejected() {
    let setup = TestSetup::new();
    let mut alice = setup.connect("alice").await;
    let mut bob = setup.connect("bob").await;
    let (game_id, _token) = start_match(&setup, &mut alice, &mut bob).await;

    setup
        .send(
            "bob",
            serde_json::json!({
                "type": "CLOSE_GAME",
                "payload": { "game_id": game_id, "access_token": "bogus" },
                "meta": null,
            }),
        )
        .await;

    bob.expect_message(MessageType::Warning).await;
    assert!(setup.app.games.exists(&game_id).await);
}
