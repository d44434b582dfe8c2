use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::game::{GameCoordinator, GameMatch};
use crate::lobby::{spawn_game_list_listener, ChallengeTicket, LobbyCoordinator};
use crate::notify::{NotificationQueue, QueueError};
use crate::registry::{Registry, RegistryError};
use crate::session::ClientSession;
use crate::timer::TimerService;
use crate::websockets::Outbound;

#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or missing required field; rejected before any mutation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown game, challenge or player key.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Registry collision, e.g. a username already connected.
    #[error("Already in use: {0}")]
    DuplicateKey(String),

    /// Acting out of turn, answering a stale challenge, closing a game the
    /// caller does not own.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Payload failed decoding.
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Internal server error")]
    Internal,
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateKey => AppError::DuplicateKey(err.to_string()),
            RegistryError::NotFound => AppError::NotFound(err.to_string()),
        }
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        AppError::InvalidOperation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidArgument(msg) | AppError::Malformed(msg) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::DuplicateKey(msg) | AppError::InvalidOperation(msg) => {
                (StatusCode::CONFLICT, msg)
            }
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub clients: Arc<Registry<String, ClientSession>>,
    pub games: Arc<Registry<String, Arc<GameMatch>>>,
    pub challenges: Arc<Registry<ChallengeTicket, CancellationToken>>,
    pub queue: Arc<NotificationQueue>,
    pub outbound: Arc<Outbound>,
    pub lobby: Arc<LobbyCoordinator>,
    pub game: Arc<GameCoordinator>,
    /// Process-wide lifecycle context: cancelled once on shutdown, which
    /// stops the notification queue and every background listener.
    shutdown: CancellationToken,
    game_removals: Arc<Mutex<Option<mpsc::UnboundedReceiver<String>>>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let clients = Arc::new(Registry::new());
        let games = Arc::new(Registry::new());
        let challenges = Arc::new(Registry::new());
        let turn_timers = Arc::new(Registry::new());
        let timer = Arc::new(TimerService::new());
        let queue = Arc::new(NotificationQueue::new());
        let outbound = Arc::new(Outbound::new(clients.clone()));

        let (removal_tx, removal_rx) = mpsc::unbounded_channel();

        let lobby = Arc::new(LobbyCoordinator::new(
            clients.clone(),
            games.clone(),
            challenges.clone(),
            timer.clone(),
            queue.clone(),
            outbound.clone(),
        ));

        let game = Arc::new(GameCoordinator::new(
            clients.clone(),
            games.clone(),
            turn_timers,
            timer,
            outbound.clone(),
            removal_tx,
        ));

        Self {
            clients,
            games,
            challenges,
            queue,
            outbound,
            lobby,
            game,
            shutdown: CancellationToken::new(),
            game_removals: Arc::new(Mutex::new(Some(removal_rx))),
        }
    }

    /// Starts the notification-queue flush loop and the game-removal
    /// listener. Called once on service start; both run until
    /// [`Self::shutdown`].
    pub fn start_background(&self) -> Result<(), QueueError> {
        let outbound = self.outbound.clone();
        self.queue.start(self.shutdown.clone(), move |batch| {
            let outbound = outbound.clone();
            async move {
                for notification in batch {
                    outbound
                        .send_to_players(&notification.receivers, &notification.message)
                        .await;
                }
            }
        })?;

        let removal_rx = self
            .game_removals
            .lock()
            .unwrap()
            .take()
            .expect("background tasks already started");
        spawn_game_list_listener(
            removal_rx,
            self.clients.clone(),
            self.queue.clone(),
            self.shutdown.clone(),
        );

        info!("Background tasks started");
        Ok(())
    }

    /// Tears down the background tasks. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
