#![allow(dead_code)] // Test utilities may not all be used in every test

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

use fourwins::game::GameMatch;
use fourwins::messages::{MessageType, WebSocketMessage};
use fourwins::shared::{AppError, AppState};
use fourwins::websockets::LobbyMessageDispatcher;

/// One simulated connected client: its registered session plus the receiving
/// end of the outbound channel a real socket would pump.
pub struct TestClient {
    pub username: String,
    rx: UnboundedReceiver<String>,
}

impl TestClient {
    /// Waits until a message of the wanted type arrives, skipping unrelated
    /// traffic, and returns it.
    pub async fn expect_message(&mut self, wanted: MessageType) -> WebSocketMessage {
        let deadline = Duration::from_secs(2);
        tokio::time::timeout(deadline, async {
            loop {
                let frame = self.rx.recv().await.expect("connection closed");
                let message: WebSocketMessage = serde_json::from_str(&frame).unwrap();
                if message.message_type == wanted {
                    return message;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {} for {}", wanted, self.username))
    }

    /// Everything currently buffered for this client.
    pub fn drain(&mut self) -> Vec<WebSocketMessage> {
        let mut messages = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            messages.push(serde_json::from_str(&frame).unwrap());
        }
        messages
    }

    pub fn assert_no_message_of_type(&mut self, unwanted: MessageType) {
        let messages = self.drain();
        assert!(
            messages.iter().all(|m| m.message_type != unwanted),
            "{} unexpectedly received {}",
            self.username,
            unwanted
        );
    }
}

/// Shared test fixture: the full application state with running background
/// tasks, driven through the same dispatcher the WebSocket layer uses.
pub struct TestSetup {
    pub app: AppState,
    dispatcher: LobbyMessageDispatcher,
}

impl Default for TestSetup {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSetup {
    pub fn new() -> Self {
        let app = AppState::new();
        app.start_background().expect("queue starts once");
        let dispatcher = LobbyMessageDispatcher::new(
            app.lobby.clone(),
            app.game.clone(),
            app.outbound.clone(),
        );
        Self { app, dispatcher }
    }

    pub async fn connect(&self, username: &str) -> TestClient {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.app
            .lobby
            .connect_client(username, tx)
            .await
            .unwrap_or_else(|e| panic!("{} could not connect: {}", username, e));
        TestClient {
            username: username.to_string(),
            rx,
        }
    }

    pub async fn connect_expecting_rejection(&self, username: &str) -> AppError {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        self.app
            .lobby
            .connect_client(username, tx)
            .await
            .expect_err("connection should be rejected")
    }

    pub async fn disconnect(&self, username: &str) {
        self.app.lobby.disconnect_client(username).await;
    }

    /// Feeds one raw frame through the inbound dispatcher, exactly as a
    /// message arriving on the wire would be handled.
    pub async fn send(&self, username: &str, frame: serde_json::Value) {
        use fourwins::websockets::MessageHandler as _;
        self.dispatcher
            .handle_message(username, frame.to_string())
            .await;
    }

    pub async fn send_challenge(&self, issuer: &str, receiver: &str) {
        self.send(
            issuer,
            serde_json::json!({
                "type": "DELEGATE_CHALLENGE",
                "payload": { "receiver": receiver },
                "meta": null,
            }),
        )
        .await;
    }

    pub async fn send_challenge_answer(
        &self,
        responder: &str,
        challenge: &serde_json::Value,
        accepted: bool,
    ) {
        self.send(
            responder,
            serde_json::json!({
                "type": "FORWARD_CHALLENGE_RESPONSE",
                "payload": { "challenge": challenge, "accepted": accepted },
                "meta": null,
            }),
        )
        .await;
    }

    pub async fn send_verify(&self, username: &str, game_id: &str, access_token: &str) {
        self.send(
            username,
            serde_json::json!({
                "type": "VERIFY_PLAYER",
                "payload": { "game_id": game_id, "access_token": access_token },
                "meta": null,
            }),
        )
        .await;
    }

    pub async fn send_move(&self, username: &str, game_id: &str, access_token: &str, column: usize) {
        self.send(
            username,
            serde_json::json!({
                "type": "PERFORM_GAME_MOVE",
                "payload": { "game_id": game_id, "access_token": access_token, "column": column },
                "meta": null,
            }),
        )
        .await;
    }

    /// Waits out one notification-queue flush window.
    pub async fn wait_for_flush(&self) {
        tokio::time::sleep(Duration::from_millis(700)).await;
    }

    /// Inserts a match directly, for scenarios that need a non-default turn
    /// time (the challenge path always allocates with the 90s default).
    pub async fn insert_match(&self, turn_time: Duration) -> Arc<GameMatch> {
        let game = Arc::new(GameMatch::new(turn_time));
        self.app
            .games
            .store(game.id.clone(), game.clone())
            .await
            .unwrap();
        game
    }
}
