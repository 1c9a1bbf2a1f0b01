//! Scoped "typing…" indicator.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::debug;

use crate::bot::telegram::Transport;

/// Sends a typing action right away and then every `interval` until dropped.
///
/// Hold the guard for exactly as long as the generation call is outstanding;
/// dropping it stops the task on every exit path.
pub struct TypingIndicator {
    cancel: Arc<Notify>,
}

impl TypingIndicator {
    pub fn start(transport: Arc<dyn Transport>, chat_id: i64, interval: Duration) -> Self {
        let cancel = Arc::new(Notify::new());
        let cancel_clone = cancel.clone();

        tokio::spawn(async move {
            loop {
                if let Err(e) = transport.send_typing(chat_id).await {
                    debug!("Typing indicator failed for chat {}: {}", chat_id, e);
                }

                tokio::select! {
                    biased;

                    _ = cancel_clone.notified() => break,
                    _ = sleep(interval) => {}
                }
            }
        });

        Self { cancel }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        // notify_one stores a permit, so a task that is mid-send still sees it.
        self.cancel.notify_one();
    }
}
