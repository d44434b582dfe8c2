use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::challenge::ChallengeTicket;
use crate::game::{GameMatch, WatchableGame, DEFAULT_TURN_TIME};
use crate::messages::WebSocketMessage;
use crate::notify::{Notification, NotificationQueue};
use crate::registry::Registry;
use crate::session::ClientSession;
use crate::shared::AppError;
use crate::timer::TimerService;
use crate::websockets::Outbound;

/// How long a challenge may go unanswered before it expires.
pub const CHALLENGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the challenge lifecycle and the player-list/game-list fan-out.
///
/// Every connected client, active match and pending challenge is looked up
/// through the shared registries on each operation; timer callbacks re-check
/// existence before acting, so a challenge that was answered while its
/// expiry timer was firing is simply skipped.
pub struct LobbyCoordinator {
    clients: Arc<Registry<String, ClientSession>>,
    games: Arc<Registry<String, Arc<GameMatch>>>,
    challenges: Arc<Registry<ChallengeTicket, CancellationToken>>,
    timer: Arc<TimerService>,
    queue: Arc<NotificationQueue>,
    outbound: Arc<Outbound>,
    challenge_timeout: Duration,
}

impl LobbyCoordinator {
    pub fn new(
        clients: Arc<Registry<String, ClientSession>>,
        games: Arc<Registry<String, Arc<GameMatch>>>,
        challenges: Arc<Registry<ChallengeTicket, CancellationToken>>,
        timer: Arc<TimerService>,
        queue: Arc<NotificationQueue>,
        outbound: Arc<Outbound>,
    ) -> Self {
        Self {
            clients,
            games,
            challenges,
            timer,
            queue,
            outbound,
            challenge_timeout: CHALLENGE_TIMEOUT,
        }
    }

    /// Overrides the challenge expiry, for tests that should not wait 30s.
    pub fn with_challenge_timeout(mut self, timeout: Duration) -> Self {
        self.challenge_timeout = timeout;
        self
    }

    /// Registers a connecting user: validates the requested username, stores
    /// the session, pushes the current player and game lists to the new
    /// client and queues a player-connected update for everyone else.
    pub async fn connect_client(
        &self,
        username: &str,
        sender: mpsc::UnboundedSender<String>,
    ) -> Result<ClientSession, AppError> {
        if username.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "The specified user name was invalid due to only consisting of white space characters or being empty.".to_string(),
            ));
        }

        let session = ClientSession::new(username.to_string(), sender);
        self.clients
            .store(username.to_string(), session.clone())
            .await
            .map_err(|_| {
                AppError::DuplicateKey(
                    "The specified user name is already in use by another client.".to_string(),
                )
            })?;

        let other_players: Vec<String> = self
            .clients
            .all_values_except(&username.to_string())
            .await
            .into_iter()
            .map(|client| client.username)
            .collect();
        session.send(&WebSocketMessage::initialize_client_list(other_players.clone()));
        session.send(&WebSocketMessage::initialize_game_list(
            self.watchable_games().await,
        ));

        self.queue.enqueue(Notification {
            receivers: other_players,
            message: WebSocketMessage::update_client_list(username.to_string(), true),
        });

        info!(username = %username, "Client connected successfully");
        Ok(session)
    }

    /// Removes a disconnecting user: drops the session, invalidates every
    /// challenge the user is a party to, leaves all match broadcast groups
    /// and queues a player-disconnected update for the remaining clients.
    pub async fn disconnect_client(&self, username: &str) {
        let Some(session) = self.clients.try_get(&username.to_string()).await else {
            return;
        };
        self.clients.delete(&username.to_string()).await;

        for ticket in self.challenges.all_keys().await {
            if ticket.involves(username) {
                self.invalidate_challenge(&ticket, username).await;
            }
        }

        for game_id in session.joined_games().await {
            if let Some(game) = self.games.try_get(&game_id).await {
                game.state().await.remove_member(username);
            }
        }

        let remaining = self.client_names().await;
        self.queue.enqueue(Notification {
            receivers: remaining,
            message: WebSocketMessage::update_client_list(username.to_string(), false),
        });

        info!(username = %username, "Client disconnected");
    }

    /// Forwards a challenge from `issuer` to `receiver` and arms its expiry
    /// timer. Concurrent duplicate challenges between the same pair are
    /// deliberately not coalesced.
    pub async fn issue_challenge(
        self: &Arc<Self>,
        issuer: &str,
        receiver: &str,
    ) -> Result<(), AppError> {
        if issuer == receiver {
            return Err(AppError::InvalidOperation(
                "You can not issue challenges to yourself.".to_string(),
            ));
        }

        let receiver_session = self
            .clients
            .try_get(&receiver.to_string())
            .await
            .ok_or_else(|| {
                AppError::NotFound(
                    "Challenge could not be forwarded to opponent. Please ensure he is still connected.".to_string(),
                )
            })?;

        let ticket = ChallengeTicket::new(issuer.to_string(), receiver.to_string());
        let token = CancellationToken::new();
        self.challenges
            .store(ticket.clone(), token.clone())
            .await
            .map_err(|_| AppError::Internal)?;

        receiver_session.send(&WebSocketMessage::forward_challenge(ticket.clone()));

        let lobby = self.clone();
        self.timer.start_timer(
            self.challenge_timeout,
            token,
            move |expired: ChallengeTicket| async move {
                lobby.handle_challenge_timeout(expired).await;
            },
            ticket.clone(),
        );

        info!(
            challenge_id = %ticket.id,
            issuer = %issuer,
            receiver = %receiver,
            "Delegated challenge and started expiry timer"
        );
        Ok(())
    }

    /// Resolves a pending challenge. A response to a challenge that no
    /// longer exists (already answered, timed out, or a party disconnected)
    /// fails without side effects; this is also what rejects a double
    /// accept.
    pub async fn respond_to_challenge(
        &self,
        ticket: ChallengeTicket,
        accepted: bool,
    ) -> Result<(), AppError> {
        let Some(token) = self.challenges.try_get(&ticket).await else {
            return Err(AppError::InvalidOperation(
                "The challenge response could not be forwarded as the challenge was already invalidated.".to_string(),
            ));
        };

        token.cancel();
        self.challenges.delete(&ticket).await;

        self.outbound
            .send_to_player(
                &ticket.issuer,
                &WebSocketMessage::challenge_response(ticket.clone(), accepted),
            )
            .await;

        if accepted {
            self.create_match(&ticket).await;
        }

        info!(challenge_id = %ticket.id, accepted = accepted, "Delegated challenge response");
        Ok(())
    }

    /// Fires when an issued challenge goes unanswered past its expiry. The
    /// existence re-check guards the race with a just-answered challenge.
    pub async fn handle_challenge_timeout(&self, ticket: ChallengeTicket) {
        if !self.challenges.delete(&ticket).await {
            return;
        }

        let message = WebSocketMessage::challenge_timeout(ticket.clone());
        self.outbound.send_to_player(&ticket.issuer, &message).await;
        self.outbound.send_to_player(&ticket.receiver, &message).await;

        info!(challenge_id = %ticket.id, "Challenge expired");
    }

    /// The lobby's current watchable-game list.
    pub async fn watchable_games(&self) -> Vec<WatchableGame> {
        let mut games = Vec::new();
        for game in self.games.all_values().await {
            games.push(game.watchable().await);
        }
        games
    }

    /// Allocates the match for an accepted challenge. If either party
    /// vanished between accept and allocation, the allocation is rolled back
    /// and the survivor is told instead of leaving a dangling match behind.
    async fn create_match(&self, ticket: &ChallengeTicket) {
        let game = Arc::new(GameMatch::new(DEFAULT_TURN_TIME));
        if self.games.store(game.id.clone(), game.clone()).await.is_err() {
            warn!(game_id = %game.id, "Game id collision on match creation");
            return;
        }

        let issuer = self.clients.try_get(&ticket.issuer).await;
        let receiver = self.clients.try_get(&ticket.receiver).await;

        let (Some(issuer), Some(receiver)) = (issuer, receiver) else {
            self.games.delete(&game.id).await;

            let survivor = WebSocketMessage::warning(
                "Your opponent disconnected after accepting the challenge.".to_string(),
            );
            self.outbound.send_to_player(&ticket.issuer, &survivor).await;
            self.outbound.send_to_player(&ticket.receiver, &survivor).await;

            warn!(
                challenge_id = %ticket.id,
                "Opponent disconnected after accepting the challenge; match rolled back"
            );
            return;
        };

        let created = WebSocketMessage::match_created(
            game.id.clone(),
            game.access_token.clone(),
            ticket.issuer.clone(),
            ticket.receiver.clone(),
        );
        issuer.send(&created);
        receiver.send(&created);

        self.queue.enqueue(Notification {
            receivers: self.client_names().await,
            message: WebSocketMessage::game_added(game.watchable().await),
        });

        info!(game_id = %game.id, "Created a match and notified players");
    }

    /// Cancels and removes one challenge because `disconnected` left; the
    /// surviving party is told the challenge is gone.
    async fn invalidate_challenge(&self, ticket: &ChallengeTicket, disconnected: &str) {
        if let Some(token) = self.challenges.try_get(ticket).await {
            token.cancel();
        }
        if !self.challenges.delete(ticket).await {
            return;
        }

        if let Some(other) = ticket.other_party(disconnected) {
            self.outbound
                .send_to_player(other, &WebSocketMessage::challenge_timeout(ticket.clone()))
                .await;
        }
    }

    async fn client_names(&self) -> Vec<String> {
        self.clients
            .all_values()
            .await
            .into_iter()
            .map(|client| client.username)
            .collect()
    }
}

/// Listens for match removals published by the game coordinator and fans the
/// game-list update out to every client through the notification queue.
pub fn spawn_game_list_listener(
    mut removals: mpsc::UnboundedReceiver<String>,
    clients: Arc<Registry<String, ClientSession>>,
    queue: Arc<NotificationQueue>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let game_id = tokio::select! {
                _ = shutdown.cancelled() => break,
                removed = removals.recv() => match removed {
                    Some(game_id) => game_id,
                    None => break,
                },
            };

            let receivers: Vec<String> = clients
                .all_values()
                .await
                .into_iter()
                .map(|client| client.username)
                .collect();
            queue.enqueue(Notification {
                receivers,
                message: WebSocketMessage::game_removed(game_id),
            });
        }
    });
}
