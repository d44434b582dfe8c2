use async_trait::async_trait;
use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::game::{GameCoordinator, WatchableGame};
use crate::lobby::LobbyCoordinator;
use crate::messages::{
    ChallengeAnswerPayload, ChallengeRequestPayload, CloseGamePayload, GameMovePayload,
    GameReferencePayload, MessageType, VerifyPlayerPayload, WebSocketMessage,
};
use crate::shared::{AppError, AppState};
use crate::websockets::Outbound;

use super::socket::{Connection, MessageHandler, SocketWrapper};

/// Routes inbound client frames to the lobby and game coordinators.
///
/// Every frame gets an answer: a parse failure is `WRONG_PARAMS`, a rejected
/// challenge issue is `FORWARD_CHALLENGE_ERROR` and every other coordinator
/// error degrades to a targeted `WARNING` for the offending caller. Handler
/// tasks never crash on bad input.
pub struct LobbyMessageDispatcher {
    lobby: Arc<LobbyCoordinator>,
    game: Arc<GameCoordinator>,
    outbound: Arc<Outbound>,
}

impl LobbyMessageDispatcher {
    pub fn new(
        lobby: Arc<LobbyCoordinator>,
        game: Arc<GameCoordinator>,
        outbound: Arc<Outbound>,
    ) -> Self {
        Self {
            lobby,
            game,
            outbound,
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(
        payload: serde_json::Value,
    ) -> Result<T, AppError> {
        serde_json::from_value(payload).map_err(|e| AppError::Malformed(e.to_string()))
    }

    async fn dispatch(&self, username: &str, frame: WebSocketMessage) -> Result<(), AppError> {
        match frame.message_type {
            MessageType::DelegateChallenge => {
                let payload: ChallengeRequestPayload = Self::decode(frame.payload)?;
                self.lobby.issue_challenge(username, &payload.receiver).await
            }
            MessageType::ForwardChallengeResponse => {
                let payload: ChallengeAnswerPayload = Self::decode(frame.payload)?;
                self.lobby
                    .respond_to_challenge(payload.challenge, payload.accepted)
                    .await
            }
            MessageType::VerifyPlayer => {
                let payload: VerifyPlayerPayload = Self::decode(frame.payload)?;
                self.game
                    .verify_player(&payload.game_id, &payload.access_token, username)
                    .await
            }
            MessageType::PerformGameMove => {
                let payload: GameMovePayload = Self::decode(frame.payload)?;
                self.game
                    .make_move(
                        &payload.game_id,
                        &payload.access_token,
                        username,
                        payload.column,
                    )
                    .await
            }
            MessageType::CloseGame => {
                let payload: CloseGamePayload = Self::decode(frame.payload)?;
                self.game
                    .close_game(&payload.game_id, &payload.access_token, username)
                    .await
            }
            MessageType::LeaveGame => {
                let payload: GameReferencePayload = Self::decode(frame.payload)?;
                self.game.leave_game(&payload.game_id, username).await
            }
            MessageType::AddClientAsSpectator => {
                let payload: GameReferencePayload = Self::decode(frame.payload)?;
                self.game.add_spectator(&payload.game_id, username).await
            }
            MessageType::ReconnectPlayer => {
                let payload: GameReferencePayload = Self::decode(frame.payload)?;
                self.game.reconnect_player(&payload.game_id, username).await
            }
            other => {
                debug!(message_type = %other, "Unhandled message type");
                Ok(())
            }
        }
    }

    /// Converts a handler-level error into the targeted notification the
    /// offending caller receives; nothing is silently dropped.
    async fn notify_error(&self, username: &str, message_type: MessageType, error: AppError) {
        warn!(
            username = %username,
            message_type = %message_type,
            error = %error,
            "Client request rejected"
        );

        let response = match (&message_type, &error) {
            (_, AppError::Malformed(_)) => WebSocketMessage::wrong_params(error.to_string()),
            (MessageType::DelegateChallenge, _) => {
                WebSocketMessage::forward_challenge_error(error.to_string())
            }
            _ => WebSocketMessage::warning(error.to_string()),
        };

        self.outbound.send_to_player(username, &response).await;
    }
}

#[async_trait]
impl MessageHandler for LobbyMessageDispatcher {
    async fn handle_message(&self, username: &str, message: String) {
        debug!(username = %username, message = %message, "Received message");

        let frame: WebSocketMessage = match serde_json::from_str(&message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(username = %username, error = %e, "Failed to parse WebSocket message");
                self.outbound
                    .send_to_player(
                        username,
                        &WebSocketMessage::wrong_params(
                            "The sent data could not be parsed into a known message.".to_string(),
                        ),
                    )
                    .await;
                return;
            }
        };

        let message_type = frame.message_type;
        if let Err(error) = self.dispatch(username, frame).await {
            self.notify_error(username, message_type, error).await;
        }
    }
}

/// Builds the HTTP surface: the WebSocket endpoint plus the REST game list.
pub fn app_router(app_state: AppState) -> Router {
    Router::new()
        .route("/ws/:username", get(websocket_handler))
        .route("/games", get(list_games))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// The lobby's current watchable-game list, for client bootstrap.
async fn list_games(State(app_state): State<AppState>) -> Json<Vec<WatchableGame>> {
    Json(app_state.lobby.watchable_games().await)
}

/// WebSocket endpoint. The requested username arrives as the path parameter;
/// validation happens after the upgrade so a rejected client still receives
/// its `LOGIN_ERROR` before the connection is terminated.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(username): Path<String>,
    State(app_state): State<AppState>,
) -> Response {
    info!(username = %username, "WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, username, app_state))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(
    socket: axum::extract::ws::WebSocket,
    username: String,
    app_state: AppState,
) {
    let mut socket: Box<dyn SocketWrapper> = Box::new(socket);

    // Create the outbound channel (app -> client) and register the session.
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();
    match app_state
        .lobby
        .connect_client(&username, outbound_sender)
        .await
    {
        Ok(_session) => {}
        Err(error) => {
            warn!(username = %username, error = %error, "Login rejected");
            let _ = socket
                .send_message(WebSocketMessage::login_error(error.to_string()).to_json())
                .await;
            let _ = socket.close().await;
            return;
        }
    }

    info!(username = %username, "WebSocket connection established");

    let message_handler = Arc::new(LobbyMessageDispatcher::new(
        app_state.lobby.clone(),
        app_state.game.clone(),
        app_state.outbound.clone(),
    ));

    let connection = Connection::new(username.clone(), socket, outbound_receiver, message_handler);

    match connection.run().await {
        Ok(()) => {
            info!(username = %username, "WebSocket connection closed cleanly");
        }
        Err(e) => {
            warn!(username = %username, error = ?e, "WebSocket connection error");
        }
    }

    // Cleanup: the lobby removes the session, invalidates challenges and
    // tells everyone else.
    app_state.lobby.disconnect_client(&username).await;
}
