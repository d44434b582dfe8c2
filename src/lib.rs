// Library crate for the four wins game server
// This file exposes the public API for integration tests

pub mod board;
pub mod game;
pub mod lobby;
pub mod messages;
pub mod notify;
pub mod registry;
pub mod session;
pub mod shared;
pub mod timer;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use board::{Board, BoardError, Mark};
pub use game::{GameCoordinator, GameMatch, GameSnapshot, WatchableGame};
pub use lobby::{ChallengeTicket, LobbyCoordinator};
pub use messages::{MessageType, WebSocketMessage};
pub use registry::{Registry, RegistryError};
pub use shared::{AppError, AppState};
pub use websockets::{app_router, LobbyMessageDispatcher, Outbound};
