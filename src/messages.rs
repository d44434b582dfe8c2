use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::game::{GameSnapshot, WatchableGame};
use crate::lobby::ChallengeTicket;

/// Message types for WebSocket communication
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    // Client -> Server
    DelegateChallenge,
    ForwardChallengeResponse,
    VerifyPlayer,
    PerformGameMove,
    CloseGame,
    LeaveGame,
    AddClientAsSpectator,
    ReconnectPlayer,

    // Server -> Client
    InitializeClientList,
    InitializeGameList,
    UpdateClientList,
    UpdateGameList,
    LoginError,
    ForwardChallenge,
    ForwardChallengeError,
    ChallengeResponse,
    ChallengeTimeout,
    MatchCreated,
    IsPlayer,
    IsWatching,
    TurnOf,
    MoveDone,
    MoveInvalid,
    TurnOver,
    Winner,
    BoardFull,
    GameClosed,
    ReconnectedOn,
    WrongParams,
    Warning,
}

/// Metadata for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessageMeta {
    pub timestamp: DateTime<Utc>,
}

/// Base structure for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub payload: serde_json::Value,
    pub meta: Option<WebSocketMessageMeta>,
}

/// Client-to-Server message payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRequestPayload {
    pub receiver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeAnswerPayload {
    pub challenge: ChallengeTicket,
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPlayerPayload {
    pub game_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMovePayload {
    pub game_id: String,
    pub access_token: String,
    pub column: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseGamePayload {
    pub game_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameReferencePayload {
    pub game_id: String,
}

/// Server-to-Client message payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientListPayload {
    pub players: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameListPayload {
    pub games: Vec<WatchableGame>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientUpdatePayload {
    pub player: String,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameAddedPayload {
    pub added: WatchableGame,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRemovedPayload {
    pub removed_game_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardedChallengePayload {
    pub challenge: ChallengeTicket,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeAnsweredPayload {
    pub challenge: ChallengeTicket,
    pub accepted: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeTimeoutPayload {
    pub challenge: ChallengeTicket,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCreatedPayload {
    pub game_id: String,
    pub access_token: String,
    pub issuer: String,
    pub receiver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsPlayerPayload {
    pub game_id: String,
    pub is_player: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOfPayload {
    pub game_id: String,
    pub player: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveDonePayload {
    pub game_id: String,
    pub player: String,
    pub column: usize,
    pub row: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveInvalidPayload {
    pub game_id: String,
    pub column: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinnerPayload {
    pub game_id: String,
    pub player: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectedPayload {
    pub game_id: String,
    pub is_player: bool,
    pub is_current_player: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Helper functions for creating messages
impl WebSocketMessage {
    pub fn new(message_type: MessageType, payload: serde_json::Value) -> Self {
        Self {
            message_type,
            payload,
            meta: Some(WebSocketMessageMeta {
                timestamp: Utc::now(),
            }),
        }
    }

    /// Serializes for the wire; the envelope contains no non-serializable
    /// state, so this cannot fail in practice.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Create an INITIALIZE_CLIENT_LIST message
    pub fn initialize_client_list(players: Vec<String>) -> Self {
        let payload = ClientListPayload { players };
        Self::new(
            MessageType::InitializeClientList,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create an INITIALIZE_GAME_LIST message
    pub fn initialize_game_list(games: Vec<WatchableGame>) -> Self {
        let payload = GameListPayload { games };
        Self::new(
            MessageType::InitializeGameList,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create an UPDATE_CLIENT_LIST message for a connect or disconnect
    pub fn update_client_list(player: String, connected: bool) -> Self {
        let payload = ClientUpdatePayload { player, connected };
        Self::new(
            MessageType::UpdateClientList,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create an UPDATE_GAME_LIST message announcing a new match
    pub fn game_added(added: WatchableGame) -> Self {
        let payload = GameAddedPayload { added };
        Self::new(
            MessageType::UpdateGameList,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create an UPDATE_GAME_LIST message announcing a removed match
    pub fn game_removed(removed_game_id: String) -> Self {
        let payload = GameRemovedPayload { removed_game_id };
        Self::new(
            MessageType::UpdateGameList,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a LOGIN_ERROR message
    pub fn login_error(message: String) -> Self {
        let payload = ErrorPayload { message };
        Self::new(
            MessageType::LoginError,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a FORWARD_CHALLENGE message
    pub fn forward_challenge(challenge: ChallengeTicket) -> Self {
        let message = format!(
            "Player {} challenges you ({}) to a game of four wins.",
            challenge.issuer, challenge.receiver
        );
        let payload = ForwardedChallengePayload { challenge, message };
        Self::new(
            MessageType::ForwardChallenge,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a FORWARD_CHALLENGE_ERROR message
    pub fn forward_challenge_error(message: String) -> Self {
        let payload = ErrorPayload { message };
        Self::new(
            MessageType::ForwardChallengeError,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a CHALLENGE_RESPONSE message
    pub fn challenge_response(challenge: ChallengeTicket, accepted: bool) -> Self {
        let message = if accepted {
            format!("{} accepted your challenge.", challenge.receiver)
        } else {
            format!("{} denied your challenge.", challenge.receiver)
        };
        let payload = ChallengeAnsweredPayload {
            challenge,
            accepted,
            message,
        };
        Self::new(
            MessageType::ChallengeResponse,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a CHALLENGE_TIMEOUT message
    pub fn challenge_timeout(challenge: ChallengeTicket) -> Self {
        let message = format!(
            "The challenge with id {} expired due to {} not responding on time.",
            challenge.id, challenge.receiver
        );
        let payload = ChallengeTimeoutPayload { challenge, message };
        Self::new(
            MessageType::ChallengeTimeout,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a MATCH_CREATED message
    pub fn match_created(
        game_id: String,
        access_token: String,
        issuer: String,
        receiver: String,
    ) -> Self {
        let payload = MatchCreatedPayload {
            game_id,
            access_token,
            issuer,
            receiver,
        };
        Self::new(
            MessageType::MatchCreated,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create an IS_PLAYER message
    pub fn is_player(game_id: String, is_player: bool) -> Self {
        let payload = IsPlayerPayload { game_id, is_player };
        Self::new(
            MessageType::IsPlayer,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create an IS_WATCHING message carrying the replayable game state
    pub fn is_watching(snapshot: GameSnapshot) -> Self {
        Self::new(
            MessageType::IsWatching,
            serde_json::to_value(snapshot).unwrap(),
        )
    }

    /// Create a TURN_OF message
    pub fn turn_of(game_id: String, player: String) -> Self {
        let payload = TurnOfPayload { game_id, player };
        Self::new(MessageType::TurnOf, serde_json::to_value(payload).unwrap())
    }

    /// Create a MOVE_DONE message
    pub fn move_done(game_id: String, player: String, column: usize, row: usize) -> Self {
        let payload = MoveDonePayload {
            game_id,
            player,
            column,
            row,
        };
        Self::new(
            MessageType::MoveDone,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a MOVE_INVALID message
    pub fn move_invalid(game_id: String, column: usize) -> Self {
        let payload = MoveInvalidPayload { game_id, column };
        Self::new(
            MessageType::MoveInvalid,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a TURN_OVER message
    pub fn turn_over(game_id: String) -> Self {
        let payload = GameReferencePayload { game_id };
        Self::new(
            MessageType::TurnOver,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a WINNER message
    pub fn winner(game_id: String, player: String) -> Self {
        let payload = WinnerPayload { game_id, player };
        Self::new(MessageType::Winner, serde_json::to_value(payload).unwrap())
    }

    /// Create a BOARD_FULL message
    pub fn board_full(game_id: String) -> Self {
        let payload = GameReferencePayload { game_id };
        Self::new(
            MessageType::BoardFull,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a GAME_CLOSED message
    pub fn game_closed(game_id: String) -> Self {
        let payload = GameReferencePayload { game_id };
        Self::new(
            MessageType::GameClosed,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a RECONNECTED_ON message
    pub fn reconnected_on(game_id: String, is_player: bool, is_current_player: bool) -> Self {
        let payload = ReconnectedPayload {
            game_id,
            is_player,
            is_current_player,
        };
        Self::new(
            MessageType::ReconnectedOn,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a WRONG_PARAMS message
    pub fn wrong_params(message: String) -> Self {
        let payload = ErrorPayload { message };
        Self::new(
            MessageType::WrongParams,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a WARNING message
    pub fn warning(message: String) -> Self {
        let payload = ErrorPayload { message };
        Self::new(MessageType::Warning, serde_json::to_value(payload).unwrap())
    }
}
