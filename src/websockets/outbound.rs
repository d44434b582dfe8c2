use std::sync::Arc;

use crate::messages::WebSocketMessage;
use crate::registry::Registry;
use crate::session::ClientSession;

/// Outbound fan-out over the client registry.
///
/// Single-send and broadcast-send are two distinct named operations; every
/// broadcast iterates a registry snapshot of receivers. Receivers that
/// disconnected between snapshot and send are skipped.
pub struct Outbound {
    clients: Arc<Registry<String, ClientSession>>,
}

impl Outbound {
    pub fn new(clients: Arc<Registry<String, ClientSession>>) -> Self {
        Self { clients }
    }

    pub async fn send_to_player(&self, username: &str, message: &WebSocketMessage) {
        if let Some(session) = self.clients.try_get(&username.to_string()).await {
            session.send(message);
        }
    }

    pub async fn send_to_players(&self, usernames: &[String], message: &WebSocketMessage) {
        for username in usernames {
            self.send_to_player(username, message).await;
        }
    }

    pub async fn send_to_all(&self, message: &WebSocketMessage) {
        for session in self.clients.all_values().await {
            session.send(message);
        }
    }

    pub async fn send_to_all_except(&self, excluded: &str, message: &WebSocketMessage) {
        for session in self.clients.all_values_except(&excluded.to_string()).await {
            session.send(message);
        }
    }
}
