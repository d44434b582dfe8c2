use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next message from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Handler for incoming WebSocket messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an incoming message from the client
    async fn handle_message(&self, username: &str, message: String);
}

#[derive(Debug)]
pub enum SocketError {
    ConnectionClosed,
    SendFailed(String),
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        match self.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(text)),
            Some(Ok(Message::Close(_))) => Ok(None),
            Some(Ok(_)) => Ok(None), // Ignore binary/ping/pong
            Some(Err(e)) => Err(SocketError::ReceiveFailed(e.to_string())),
            None => Ok(None), // Connection closed
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Connection represents a managed WebSocket connection.
/// It pumps outbound frames from the session's channel into the socket and
/// feeds inbound frames into the message handler until disconnect.
pub struct Connection {
    pub username: String,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
    message_handler: Arc<dyn MessageHandler>,
}

impl Connection {
    pub fn new(
        username: String,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<String>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            username,
            socket,
            outbound_receiver,
            message_handler,
        }
    }

    /// Run the connection - handles both sending and receiving until disconnect
    pub async fn run(mut self) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                // Handle outbound messages (from our app to client)
                msg = self.outbound_receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.socket.send_message(message).await?
                        }
                        None => break, // Channel closed, disconnect
                    }
                }

                // Handle inbound messages (from client to our app)
                msg = self.socket.receive_message() => {
                    match msg {
                        Ok(Some(message)) => {
                            self.message_handler
                                .handle_message(&self.username, message)
                                .await;
                        }
                        Ok(None) => break, // Client disconnected
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        // Clean disconnect
        let _ = self.socket.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Socket double that replays scripted inbound frames and records sends.
    struct ScriptedSocket {
        inbound: Mutex<Vec<String>>,
        sent: Arc<Mutex<Vec<String>>>,
        /// When true, an exhausted script blocks instead of reporting a
        /// disconnect, so the test drives the loop via the outbound side.
        pend_when_empty: bool,
    }

    #[async_trait]
    impl SocketWrapper for ScriptedSocket {
        async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
            let next = {
                let mut inbound = self.inbound.lock().unwrap();
                if inbound.is_empty() {
                    None
                } else {
                    Some(inbound.remove(0))
                }
            };
            match next {
                Some(frame) => Ok(Some(frame)),
                None if self.pend_when_empty => std::future::pending().await,
                None => Ok(None),
            }
        }

        async fn close(&mut self) -> Result<(), SocketError> {
            Ok(())
        }
    }

    struct RecordingHandler {
        received: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle_message(&self, username: &str, message: String) {
            self.received
                .lock()
                .unwrap()
                .push((username.to_string(), message));
        }
    }

    #[tokio::test]
    async fn test_connection_feeds_inbound_frames_to_the_handler() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let socket = ScriptedSocket {
            inbound: Mutex::new(vec!["one".to_string(), "two".to_string()]),
            sent: Arc::new(Mutex::new(Vec::new())),
            pend_when_empty: false,
        };
        let handler = Arc::new(RecordingHandler {
            received: received.clone(),
        });
        let (_tx, rx) = mpsc::unbounded_channel();

        let connection = Connection::new("alice".to_string(), Box::new(socket), rx, handler);
        connection.run().await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], ("alice".to_string(), "one".to_string()));
    }

    #[tokio::test]
    async fn test_connection_pumps_outbound_frames_to_the_socket() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let socket = ScriptedSocket {
            inbound: Mutex::new(Vec::new()),
            sent: sent.clone(),
            pend_when_empty: true,
        };
        let handler = Arc::new(RecordingHandler {
            received: Arc::new(Mutex::new(Vec::new())),
        });
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send("queued before run".to_string()).unwrap();
        drop(tx); // Closing the channel ends the connection loop.

        let connection = Connection::new("alice".to_string(), Box::new(socket), rx, handler);
        connection.run().await.unwrap();

        assert_eq!(*sent.lock().unwrap(), vec!["queued before run".to_string()]);
    }
}
