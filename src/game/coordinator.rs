use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::match_state::{FinishReason, GameMatch, GameSnapshot, MatchPhase, MatchState};
use crate::messages::WebSocketMessage;
use crate::registry::Registry;
use crate::session::ClientSession;
use crate::shared::AppError;
use crate::timer::TimerService;
use crate::websockets::Outbound;

/// Owns one active match's turn state, move validation and win/terminate
/// sequencing.
///
/// All mutation of a match goes through its own mutex, so handler
/// invocations for one game id are serialized; the registries only guarantee
/// that the shared `Arc` itself is stable. Turn-timer callbacks re-check the
/// match still exists before acting.
pub struct GameCoordinator {
    clients: Arc<Registry<String, ClientSession>>,
    games: Arc<Registry<String, Arc<GameMatch>>>,
    /// Live turn-timer token per game id; replaced on every timer restart.
    turn_timers: Arc<Registry<String, CancellationToken>>,
    timer: Arc<TimerService>,
    outbound: Arc<Outbound>,
    /// Removal hook consumed by the lobby's game-list listener.
    removals: mpsc::UnboundedSender<String>,
}

impl GameCoordinator {
    pub fn new(
        clients: Arc<Registry<String, ClientSession>>,
        games: Arc<Registry<String, Arc<GameMatch>>>,
        turn_timers: Arc<Registry<String, CancellationToken>>,
        timer: Arc<TimerService>,
        outbound: Arc<Outbound>,
        removals: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            clients,
            games,
            turn_timers,
            timer,
            outbound,
            removals,
        }
    }

    /// Claims a player slot for `username` if the access token matches.
    ///
    /// A mismatched token or an already-full roster answers
    /// `IsPlayer { is_player: false }` instead of failing the call. When the
    /// second slot fills, the match transitions to `InProgress`, the first
    /// verifier's turn is announced and the turn timer starts.
    pub async fn verify_player(
        self: &Arc<Self>,
        game_id: &str,
        access_token: &str,
        username: &str,
    ) -> Result<(), AppError> {
        let game = self.get_game(game_id).await?;

        if game.access_token != access_token {
            self.outbound
                .send_to_player(
                    username,
                    &WebSocketMessage::is_player(game_id.to_string(), false),
                )
                .await;
            return Ok(());
        }

        let mut state = game.state().await;
        if !state.claim_slot(username) {
            drop(state);
            self.outbound
                .send_to_player(
                    username,
                    &WebSocketMessage::is_player(game_id.to_string(), false),
                )
                .await;
            return Ok(());
        }

        state.add_member(username);
        if let Some(session) = self.clients.try_get(&username.to_string()).await {
            session.join_game(game_id).await;
        }
        self.outbound
            .send_to_player(
                username,
                &WebSocketMessage::is_player(game_id.to_string(), true),
            )
            .await;
        info!(game_id = %game_id, username = %username, "Player verified");

        if state.is_roster_full() && state.phase == MatchPhase::AwaitingPlayers {
            state.phase = MatchPhase::InProgress;
            state.advance_turn();

            let current = state.current_player.clone().unwrap_or_default();
            self.outbound
                .send_to_players(
                    &state.members,
                    &WebSocketMessage::turn_of(game_id.to_string(), current),
                )
                .await;
            drop(state);

            self.start_turn_timer(&game).await;
            info!(game_id = %game_id, "Both players verified, match started");
        }

        Ok(())
    }

    /// Executes one validated move for the current player.
    ///
    /// A board-level rejection (unknown or full column) answers the caller
    /// with `MoveInvalid` and leaves the match untouched; acting out of turn
    /// or with a bad token is an `InvalidOperation`.
    pub async fn make_move(
        self: &Arc<Self>,
        game_id: &str,
        access_token: &str,
        username: &str,
        column: usize,
    ) -> Result<(), AppError> {
        let game = self.get_game(game_id).await?;
        let mut state = game.state().await;

        if state.phase != MatchPhase::InProgress {
            return Err(AppError::InvalidOperation(format!(
                "Game {} has not started yet.",
                game_id
            )));
        }

        if state.current_player.as_deref() != Some(username) {
            return Err(AppError::InvalidOperation(format!(
                "{} is not the current player.",
                username
            )));
        }

        if game.access_token != access_token {
            return Err(AppError::InvalidOperation(
                "The supplied access token is not valid for this game.".to_string(),
            ));
        }

        let mark = state
            .mark_for(username)
            .ok_or_else(|| AppError::Internal)?;

        let row = match state.board.place(mark, column) {
            Ok(row) => row,
            Err(err) => {
                warn!(game_id = %game_id, username = %username, error = %err, "Move rejected");
                drop(state);
                self.outbound
                    .send_to_player(
                        username,
                        &WebSocketMessage::move_invalid(game_id.to_string(), column),
                    )
                    .await;
                return Ok(());
            }
        };

        // The running turn clock belongs to the move that just completed;
        // it must be cancelled exactly once before the next one starts.
        self.cancel_turn_timer(game_id).await;

        state.moves.push(super::match_state::MoveRecord {
            player: username.to_string(),
            column,
        });

        self.outbound
            .send_to_players(
                &state.members,
                &WebSocketMessage::move_done(game_id.to_string(), username.to_string(), column, row),
            )
            .await;
        info!(game_id = %game_id, username = %username, column = column, row = row, "Move done");

        if state.board.has_win_at(mark, row, column) {
            self.outbound
                .send_to_players(
                    &state.members,
                    &WebSocketMessage::winner(game_id.to_string(), username.to_string()),
                )
                .await;
            info!(game_id = %game_id, username = %username, "Player wins the game");
            self.close_match(&game, &mut state, FinishReason::Won).await;
            return Ok(());
        }

        if state.board.is_full() {
            self.outbound
                .send_to_players(
                    &state.members,
                    &WebSocketMessage::board_full(game_id.to_string()),
                )
                .await;
            info!(game_id = %game_id, "Board is full");
            self.close_match(&game, &mut state, FinishReason::BoardFull)
                .await;
            return Ok(());
        }

        state.advance_turn();
        let current = state.current_player.clone().unwrap_or_default();
        self.outbound
            .send_to_players(
                &state.members,
                &WebSocketMessage::turn_of(game_id.to_string(), current),
            )
            .await;
        drop(state);

        self.start_turn_timer(&game).await;
        Ok(())
    }

    /// Fires when a turn clock elapses with no move made: a soft nudge to
    /// the waiting players, never a forfeiture. The clock re-arms so an idle
    /// current player keeps getting reported. If every player slot has
    /// disconnected the match is closed instead.
    pub fn handle_turn_timeout<'a>(
        self: &'a Arc<Self>,
        game_id: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
        let Some(game) = self.games.try_get(&game_id).await else {
            self.turn_timers.delete(&game_id).await;
            return;
        };

        let mut state = game.state().await;
        if state.phase != MatchPhase::InProgress {
            return;
        }

        let mut any_player_connected = false;
        for player in state.players.iter().flatten() {
            if self.clients.exists(player).await {
                any_player_connected = true;
            }
        }

        if !any_player_connected {
            warn!(game_id = %game_id, "Both players have left the game. Game will be closed.");
            self.close_match(&game, &mut state, FinishReason::Closed)
                .await;
            return;
        }

        let message = WebSocketMessage::turn_over(game_id.clone());
        for waiting in state.non_current_players() {
            self.outbound.send_to_player(&waiting, &message).await;
        }
        info!(game_id = %game_id, "Turn timer elapsed, waiting players nudged");
        drop(state);

        self.start_turn_timer(&game).await;
        })
    }

    /// Registers `username` as a spectator: sends the replayable state
    /// snapshot and joins the broadcast group without granting move rights.
    pub async fn add_spectator(&self, game_id: &str, username: &str) -> Result<(), AppError> {
        let game = self.get_game(game_id).await?;

        let mut state = game.state().await;
        let snapshot = Self::snapshot(game_id, &state);
        state.add_member(username);
        drop(state);

        if let Some(session) = self.clients.try_get(&username.to_string()).await {
            session.join_game(game_id).await;
        }
        self.outbound
            .send_to_player(username, &WebSocketMessage::is_watching(snapshot))
            .await;

        info!(game_id = %game_id, username = %username, "Spectator added");
        Ok(())
    }

    /// Terminates a match on request of one of its verified players.
    pub async fn close_game(
        &self,
        game_id: &str,
        access_token: &str,
        username: &str,
    ) -> Result<(), AppError> {
        let game = self.get_game(game_id).await?;

        if game.access_token != access_token {
            return Err(AppError::InvalidOperation(format!(
                "You are not allowed to close game: {}",
                game_id
            )));
        }

        let mut state = game.state().await;
        self.close_match(&game, &mut state, FinishReason::Closed)
            .await;

        info!(game_id = %game_id, username = %username, "Game closed on player request");
        Ok(())
    }

    /// Cuts the caller's association with the match without affecting it.
    pub async fn leave_game(&self, game_id: &str, username: &str) -> Result<(), AppError> {
        if let Some(game) = self.games.try_get(&game_id.to_string()).await {
            game.state().await.remove_member(username);
        }

        if let Some(session) = self.clients.try_get(&username.to_string()).await {
            session.leave_game(game_id).await;
        }

        info!(game_id = %game_id, username = %username, "Client left game");
        Ok(())
    }

    /// Restores a returning player's view: the replayable snapshot plus
    /// whether it is their turn. Callers that are not players of the game
    /// only learn that they are not.
    pub async fn reconnect_player(&self, game_id: &str, username: &str) -> Result<(), AppError> {
        let game = self.get_game(game_id).await?;

        let mut state = game.state().await;
        if !state.is_player(username) {
            drop(state);
            self.outbound
                .send_to_player(
                    username,
                    &WebSocketMessage::reconnected_on(game_id.to_string(), false, false),
                )
                .await;
            return Ok(());
        }

        let snapshot = Self::snapshot(game_id, &state);
        let is_current = state.current_player.as_deref() == Some(username);
        state.add_member(username);
        drop(state);

        if let Some(session) = self.clients.try_get(&username.to_string()).await {
            session.join_game(game_id).await;
        }
        self.outbound
            .send_to_player(username, &WebSocketMessage::is_watching(snapshot))
            .await;
        self.outbound
            .send_to_player(
                username,
                &WebSocketMessage::reconnected_on(game_id.to_string(), true, is_current),
            )
            .await;

        info!(game_id = %game_id, username = %username, "Player reconnected");
        Ok(())
    }

    async fn get_game(&self, game_id: &str) -> Result<Arc<GameMatch>, AppError> {
        self.games
            .try_get(&game_id.to_string())
            .await
            .ok_or_else(|| AppError::NotFound(format!("No game with ID: {} found.", game_id)))
    }

    fn snapshot(game_id: &str, state: &MatchState) -> GameSnapshot {
        GameSnapshot {
            game_id: game_id.to_string(),
            players: state.players.iter().flatten().cloned().collect(),
            current_player: state.current_player.clone(),
            moves: state.moves.clone(),
        }
    }

    /// Arms a fresh turn clock for the match. Any clock still registered for
    /// this game is cancelled first, so exactly one is live per match.
    async fn start_turn_timer(self: &Arc<Self>, game: &Arc<GameMatch>) {
        let token = CancellationToken::new();
        self.cancel_turn_timer(&game.id).await;
        if self
            .turn_timers
            .store(game.id.clone(), token.clone())
            .await
            .is_err()
        {
            // A concurrent restart won the race; its timer is live.
            return;
        }

        let coordinator = self.clone();
        self.timer.start_timer(
            game.turn_time,
            token,
            move |game_id: String| async move {
                coordinator.handle_turn_timeout(game_id).await;
            },
            game.id.clone(),
        );
    }

    /// Cancels a turn clock that has not fired yet; tolerates an already
    /// fired or already removed one.
    async fn cancel_turn_timer(&self, game_id: &str) {
        if let Some(token) = self.turn_timers.try_get(&game_id.to_string()).await {
            token.cancel();
        }
        self.turn_timers.delete(&game_id.to_string()).await;
    }

    /// Shared terminate path: marks the phase, stops the clock, removes the
    /// match from the registry, tells the broadcast group and publishes the
    /// removal for the lobby's game list. Forward-only: the match cannot be
    /// reopened afterwards.
    async fn close_match(
        &self,
        game: &Arc<GameMatch>,
        state: &mut MatchState,
        reason: FinishReason,
    ) {
        state.phase = MatchPhase::Finished(reason);
        self.cancel_turn_timer(&game.id).await;
        self.games.delete(&game.id).await;

        self.outbound
            .send_to_players(&state.members, &WebSocketMessage::game_closed(game.id.clone()))
            .await;

        for member in &state.members {
            if let Some(session) = self.clients.try_get(member).await {
                session.leave_game(&game.id).await;
            }
        }

        if self.removals.send(game.id.clone()).is_err() {
            warn!(game_id = %game.id, "Game removal listener is gone");
        }

        info!(game_id = %game.id, reason = ?reason, "Match removed");
    }
}
