use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::messages::WebSocketMessage;

/// Default interval between queue flushes.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(500);

#[derive(Error, Debug, PartialEq)]
pub enum QueueError {
    #[error("Could not start queue because queue was already started")]
    AlreadyRunning,
}

/// One buffered outbound item: the receivers and the message to send them.
#[derive(Debug, Clone)]
pub struct Notification {
    pub receivers: Vec<String>,
    pub message: WebSocketMessage,
}

/// Batched outbound-message buffer decoupling event producers from the
/// transport.
///
/// Rapid-fire lobby events (several connects and disconnects within one
/// flush window) coalesce into a single drain instead of one wire write per
/// event. Items keep their individual content; only the draining is batched.
pub struct NotificationQueue {
    pending: Arc<Mutex<Vec<Notification>>>,
    running: Arc<AtomicBool>,
    delay: Duration,
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::with_delay(DEFAULT_FLUSH_DELAY)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            delay,
        }
    }

    /// Appends an item without blocking. The background loop picks it up on
    /// the next flush.
    pub fn enqueue(&self, notification: Notification) {
        let mut pending = self.pending.lock().unwrap();
        pending.push(notification);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn pending_snapshot(&self) -> Vec<Notification> {
        self.pending.lock().unwrap().clone()
    }

    /// Starts the background drain loop; it runs until the token is
    /// cancelled. The flush callback receives every currently queued item in
    /// one batch; empty windows skip the callback.
    pub fn start<F, Fut>(&self, token: CancellationToken, flush: F) -> Result<(), QueueError>
    where
        F: Fn(Vec<Notification>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(QueueError::AlreadyRunning);
        }

        let pending = self.pending.clone();
        let running = self.running.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            info!(delay_ms = delay.as_millis() as u64, "Notification queue started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                let batch = {
                    let mut pending = pending.lock().unwrap();
                    std::mem::take(&mut *pending)
                };

                if batch.is_empty() {
                    continue;
                }

                debug!(items = batch.len(), "Draining notification queue");
                flush(batch).await;
            }

            running.store(false, Ordering::SeqCst);
            info!("Notification queue stopped");
        });

        Ok(())
    }
}
