use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Spawns cancellable one-shot timers for turn clocks and challenge expiry.
///
/// A timer that is cancelled before its duration elapses never runs its
/// callback; a cancellation racing the elapse results in at most one
/// invocation. Cancelling a token whose timer has already fired is a no-op.
pub struct TimerService {
    elapsed_tx: broadcast::Sender<String>,
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerService {
    pub fn new() -> Self {
        let (elapsed_tx, _) = broadcast::channel(64);
        Self { elapsed_tx }
    }

    /// Schedules `callback(payload)` to run once after `duration`, unless the
    /// token is cancelled first.
    pub fn start_timer<T, F, Fut>(
        &self,
        duration: Duration,
        token: CancellationToken,
        callback: F,
        payload: T,
    ) where
        T: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Timer cancelled before elapse");
                }
                _ = tokio::time::sleep(duration) => {
                    // Re-check after waking: a cancellation that arrived while
                    // this task was being scheduled must still suppress the
                    // callback.
                    if !token.is_cancelled() {
                        callback(payload).await;
                    }
                }
            }
        });
    }

    /// Fire-and-forget form: publishes `key` on the elapsed channel instead
    /// of invoking a callback.
    pub fn start_keyed_timer(&self, duration: Duration, key: String, token: CancellationToken) {
        let elapsed_tx = self.elapsed_tx.clone();
        self.start_timer(duration, token, move |key: String| async move {
            let _ = elapsed_tx.send(key);
        }, key);
    }

    /// Subscribes to keys published by [`Self::start_keyed_timer`].
    pub fn subscribe_elapsed(&self) -> broadcast::Receiver<String> {
        self.elapsed_tx.subscribe()
    }
}
