mod coordinator;
mod match_state;

pub use coordinator::GameCoordinator;
pub use match_state::{
    FinishReason, GameMatch, GameSnapshot, MatchPhase, MatchState, MoveRecord, WatchableGame,
    DEFAULT_TURN_TIME, PLAYER_SLOTS,
};
