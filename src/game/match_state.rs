use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::board::{Board, Mark};

/// Number of player slots in a match.
pub const PLAYER_SLOTS: usize = 2;

/// Turn time granted to matches created from an accepted challenge.
pub const DEFAULT_TURN_TIME: Duration = Duration::from_secs(90);

/// One executed move, in execution order. The row is re-derived by replaying
/// the log, so late-joining spectators can rebuild the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub player: String,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Won,
    BoardFull,
    Closed,
}

/// Lifecycle of a match. Transitions only ever move forward; a finished
/// match is removed from the registry and cannot be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    AwaitingPlayers,
    InProgress,
    Finished(FinishReason),
}

/// Mutable per-match state, serialized by the owning [`GameMatch`] mutex.
#[derive(Debug)]
pub struct MatchState {
    pub players: [Option<String>; PLAYER_SLOTS],
    pub current_player: Option<String>,
    pub board: Board,
    pub moves: Vec<MoveRecord>,
    /// Broadcast group: players plus spectators, by username.
    pub members: Vec<String>,
    pub phase: MatchPhase,
}

impl MatchState {
    fn new() -> Self {
        Self {
            players: Default::default(),
            current_player: None,
            board: Board::new(),
            moves: Vec::new(),
            members: Vec::new(),
            phase: MatchPhase::AwaitingPlayers,
        }
    }

    /// Claims the first open player slot for `username`. Returns false when
    /// the roster is already full; a second claim by the same name is
    /// rejected the same way.
    pub fn claim_slot(&mut self, username: &str) -> bool {
        if self.is_player(username) {
            return false;
        }

        for slot in self.players.iter_mut() {
            if slot.is_none() {
                *slot = Some(username.to_string());
                return true;
            }
        }

        false
    }

    pub fn is_roster_full(&self) -> bool {
        self.players.iter().all(|slot| slot.is_some())
    }

    pub fn is_player(&self, username: &str) -> bool {
        self.players
            .iter()
            .any(|slot| slot.as_deref() == Some(username))
    }

    /// The mark a player slot owns: the first verified player plays red.
    pub fn mark_for(&self, username: &str) -> Option<Mark> {
        match self.players.iter().position(|s| s.as_deref() == Some(username)) {
            Some(0) => Some(Mark::Red),
            Some(_) => Some(Mark::Green),
            None => None,
        }
    }

    /// Advances the current player round-robin over the slot order, wrapping
    /// from the last slot to the first. Disconnected players are not skipped.
    pub fn advance_turn(&mut self) {
        let filled: Vec<&String> = self.players.iter().flatten().collect();
        if filled.is_empty() {
            return;
        }

        let next = match &self.current_player {
            None => 0,
            Some(current) => filled
                .iter()
                .position(|name| *name == current)
                .map(|i| (i + 1) % filled.len())
                .unwrap_or(0),
        };

        self.current_player = Some(filled[next].clone());
    }

    /// Registered players other than the current one.
    pub fn non_current_players(&self) -> Vec<String> {
        self.players
            .iter()
            .flatten()
            .filter(|name| Some(name.as_str()) != self.current_player.as_deref())
            .cloned()
            .collect()
    }

    pub fn add_member(&mut self, username: &str) {
        if !self.members.iter().any(|m| m == username) {
            self.members.push(username.to_string());
        }
    }

    pub fn remove_member(&mut self, username: &str) {
        self.members.retain(|m| m != username);
    }
}

/// One active match. The registry holds the single authoritative instance
/// behind an `Arc`; all mutation goes through [`Self::state`], whose mutex
/// serializes handler invocations for this match.
#[derive(Debug)]
pub struct GameMatch {
    pub id: String,
    /// Opaque secret shared by the two players, required on every move,
    /// verify and close call to distinguish players from spectators.
    pub access_token: String,
    pub turn_time: Duration,
    state: Mutex<MatchState>,
}

impl GameMatch {
    pub fn new(turn_time: Duration) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            access_token: Uuid::new_v4().to_string(),
            turn_time,
            state: Mutex::new(MatchState::new()),
        }
    }

    pub async fn state(&self) -> MutexGuard<'_, MatchState> {
        self.state.lock().await
    }

    /// Lobby-list view of this match.
    pub async fn watchable(&self) -> WatchableGame {
        let state = self.state.lock().await;
        WatchableGame {
            game_id: self.id.clone(),
            player_one: state.players[0].clone(),
            player_two: state.players[1].clone(),
        }
    }
}

impl PartialEq for GameMatch {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Entry of the lobby's watchable-game list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchableGame {
    pub game_id: String,
    pub player_one: Option<String>,
    pub player_two: Option<String>,
}

/// Snapshot sent to spectators and reconnecting players; the move log lets
/// the client replay the grid from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: String,
    pub players: Vec<String>,
    pub current_player: Option<String>,
    pub moves: Vec<MoveRecord>,
}
