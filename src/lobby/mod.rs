mod challenge;
mod coordinator;

pub use challenge::ChallengeTicket;
pub use coordinator::{spawn_game_list_listener, LobbyCoordinator, CHALLENGE_TIMEOUT};
