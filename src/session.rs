use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::messages::WebSocketMessage;

/// One connected client. Lives exclusively in the client registry: exactly
/// one per connected username, created on connect and removed on disconnect.
///
/// Cloning yields another handle onto the same connection; the username is
/// immutable for the lifetime of the connection.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub username: String,
    sender: mpsc::UnboundedSender<String>,
    games: Arc<RwLock<HashSet<String>>>,
}

impl ClientSession {
    pub fn new(username: String, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            username,
            sender,
            games: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Serializes and sends one message to this client. A send racing the
    /// disconnect loses silently; disconnect cleanup handles the rest.
    pub fn send(&self, message: &WebSocketMessage) {
        if self.sender.send(message.to_json()).is_err() {
            debug!(username = %self.username, "Dropped message for closed connection");
        }
    }

    pub async fn join_game(&self, game_id: &str) {
        let mut games = self.games.write().await;
        games.insert(game_id.to_string());
    }

    pub async fn leave_game(&self, game_id: &str) {
        let mut games = self.games.write().await;
        games.remove(game_id);
    }

    /// Snapshot of the game ids this client has joined as player or
    /// spectator; used for disconnect cleanup.
    pub async fn joined_games(&self) -> Vec<String> {
        let games = self.games.read().await;
        games.iter().cloned().collect()
    }
}

impl PartialEq for ClientSession {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_delivers_serialized_frames() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = ClientSession::new("alice".to_string(), tx);

        session.send(&WebSocketMessage::warning("careful".to_string()));

        let frame = rx.recv().await.unwrap();
        let message: WebSocketMessage = serde_json::from_str(&frame).unwrap();
        assert!(matches!(
            message.message_type,
            crate::messages::MessageType::Warning
        ));
    }

    #[tokio::test]
    async fn test_send_to_closed_connection_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let session = ClientSession::new("alice".to_string(), tx);

        session.send(&WebSocketMessage::warning("gone".to_string()));
    }

    #[tokio::test]
    async fn test_joined_games_track_join_and_leave() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = ClientSession::new("alice".to_string(), tx);

        session.join_game("game-1").await;
        session.join_game("game-2").await;
        session.leave_game("game-1").await;

        let games = session.joined_games().await;
        assert_eq!(games, vec!["game-2".to_string()]);
    }

    #[tokio::test]
    async fn test_clones_share_the_joined_set() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = ClientSession::new("alice".to_string(), tx);
        let clone = session.clone();

        session.join_game("game-1").await;

        assert_eq!(clone.joined_games().await, vec!["game-1".to_string()]);
    }
}
