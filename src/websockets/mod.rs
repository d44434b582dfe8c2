mod handler;
mod outbound;
mod socket;

pub use handler::{app_router, websocket_handler, LobbyMessageDispatcher};
pub use outbound::Outbound;
pub use socket::{Connection, MessageHandler, SocketError, SocketWrapper};
