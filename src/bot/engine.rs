//! Relay engine - routes Telegram messages to Gemini and back.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::bot::command::{Action, MenuCommand, Sessions, dispatch};
use crate::bot::gemini::Generator;
use crate::bot::message::{InboundEvent, Turn, UserProfile};
use crate::bot::store::ConversationStore;
use crate::bot::telegram::{RenderMode, Transport};
use crate::bot::texts;
use crate::bot::typing::TypingIndicator;
use crate::markdown::MarkdownEscaper;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub admin_ids: HashSet<i64>,
    pub typing_interval: Duration,
    /// Max stored turns sent with a new prompt.
    pub history_turns: usize,
    pub reserved_chars: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            admin_ids: HashSet::new(),
            typing_interval: Duration::from_secs(5),
            history_turns: 20,
            reserved_chars: None,
        }
    }
}

/// The relay.
pub struct Relay {
    config: RelayConfig,
    generator: Arc<dyn Generator>,
    store: Arc<dyn ConversationStore>,
    transport: Arc<dyn Transport>,
    sessions: Sessions,
    escaper: MarkdownEscaper,
}

impl Relay {
    pub fn new(
        config: RelayConfig,
        generator: Arc<dyn Generator>,
        store: Arc<dyn ConversationStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let escaper = match config.reserved_chars {
            Some(ref reserved) => MarkdownEscaper::with_reserved(reserved),
            None => MarkdownEscaper::new(),
        };

        Self {
            config,
            generator,
            store,
            transport,
            sessions: Sessions::new(),
            escaper,
        }
    }

    fn is_admin(&self, user_id: i64) -> bool {
        self.config.admin_ids.contains(&user_id)
    }

    /// Handle one inbound message end to end.
    pub async fn handle(&self, event: InboundEvent) {
        let user_id = event.sender.user_id;
        if let Err(e) = self.store.upsert_user(&event.sender).await {
            warn!("Failed to record user {}: {}", user_id, e);
        }

        let session = self.sessions.get(user_id);
        let (next, action) = dispatch(session, &event.inbound, self.is_admin(user_id));
        self.sessions.set(user_id, next);

        self.execute(event.chat_id, &event.sender, action).await;
    }

    async fn execute(&self, chat_id: i64, sender: &UserProfile, action: Action) {
        match action {
            Action::Menu(menu) => self.send_menu(chat_id, sender.user_id, menu).await,
            Action::Notice(text) => self.send_plain(chat_id, text).await,
            Action::Generate { prompt, photo } => {
                self.generate_reply(chat_id, sender, prompt, photo).await
            }
            Action::Broadcast(text) => self.broadcast(chat_id, &text).await,
            Action::Stats => self.send_stats(chat_id).await,
        }
    }

    async fn send_plain(&self, chat_id: i64, text: &str) {
        // Transport already logs failures.
        let _ = self.transport.send_message(chat_id, text, RenderMode::Plain).await;
    }

    async fn send_menu(&self, chat_id: i64, user_id: i64, menu: MenuCommand) {
        let _ = match menu {
            MenuCommand::Start => {
                self.transport
                    .send_keyboard(chat_id, texts::WELCOME, RenderMode::MarkdownV2, &texts::KEYBOARD)
                    .await
            }
            MenuCommand::About => {
                self.transport.send_message(chat_id, texts::ABOUT, RenderMode::MarkdownV2).await
            }
            MenuCommand::Contact => {
                self.transport.send_message(chat_id, texts::CONTACT, RenderMode::MarkdownV2).await
            }
            MenuCommand::Languages => {
                self.transport.send_message(chat_id, &texts::languages(), RenderMode::Plain).await
            }
            MenuCommand::NewChat => {
                let reply = match self.store.reset_history(user_id).await {
                    Ok(()) => texts::HISTORY_CLEARED,
                    Err(e) => {
                        warn!("Failed to reset history for {}: {}", user_id, e);
                        texts::HISTORY_CLEAR_FAILED
                    }
                };
                self.transport.send_message(chat_id, reply, RenderMode::Plain).await
            }
        };
    }

    async fn generate_reply(&self, chat_id: i64, sender: &UserProfile, prompt: String, photo: Option<String>) {
        let user_id = sender.user_id;
        let preview: String = prompt.chars().take(100).collect();
        info!("📨 Prompt from {} ({}): \"{}\" (photo: {})", sender.display(), user_id, preview, photo.is_some());

        let failure_text = if photo.is_some() { texts::PHOTO_FAILED } else { texts::PROMPT_FAILED };

        let image = match photo {
            Some(ref file_id) => match self.transport.download_attachment(file_id).await {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!("Failed to download photo from {}: {}", user_id, e);
                    self.send_plain(chat_id, failure_text).await;
                    return;
                }
            },
            None => None,
        };

        // The vision model takes a single turn: prompt plus image.
        let history = match image {
            Some(_) => Vec::new(),
            None => self.recent_history(user_id).await,
        };

        let result = {
            let _typing = TypingIndicator::start(self.transport.clone(), chat_id, self.config.typing_interval);
            self.generator.generate(&prompt, &history, image.as_ref()).await
        };

        let answer = match result {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Generation failed for {}: {}", user_id, e);
                self.send_plain(chat_id, failure_text).await;
                return;
            }
        };

        if let Err(e) = self.store.append_turns(user_id, &[Turn::user(prompt), Turn::model(answer.clone())]).await {
            warn!("Failed to save turns for {}: {}", user_id, e);
        }

        let safe = self.escaper.sanitize(&answer);
        if let Err(e) = self.transport.send_message(chat_id, &safe, RenderMode::MarkdownV2).await {
            warn!("MarkdownV2 reply rejected, falling back to plain text: {e}");
            self.send_plain(chat_id, &answer).await;
        }
    }

    /// Last `history_turns` stored turns, never starting on a model turn.
    async fn recent_history(&self, user_id: i64) -> Vec<Turn> {
        let mut history = match self.store.get_history(user_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!("Failed to load history for {}: {}", user_id, e);
                return Vec::new();
            }
        };
        let skip = window_start(history.len(), self.config.history_turns);
        history.drain(..skip);
        history
    }

    async fn broadcast(&self, chat_id: i64, text: &str) {
        let user_ids = match self.store.list_user_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to list users for broadcast: {}", e);
                Vec::new()
            }
        };

        info!("📣 Broadcasting to {} user(s)", user_ids.len());
        let mut delivered = 0;
        for &user_id in &user_ids {
            match self.transport.send_message(user_id, text, RenderMode::Plain).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Broadcast to {} failed: {}", user_id, e),
            }
        }

        info!("📣 Broadcast delivered to {}/{}", delivered, user_ids.len());
        self.send_plain(chat_id, &texts::broadcast_report(delivered, user_ids.len())).await;
    }

    async fn send_stats(&self, chat_id: i64) {
        match self.store.list_user_ids().await {
            Ok(ids) => self.send_plain(chat_id, &texts::stats_report(ids.len())).await,
            Err(e) => warn!("Failed to count users: {}", e),
        }
    }
}

/// Index of the first turn to keep so that at most `max` turns remain and
/// the window opens on a user turn. Stored turns come in user/model pairs.
fn window_start(len: usize, max: usize) -> usize {
    let skip = len.saturating_sub(max);
    (skip + skip % 2).min(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_start_keeps_everything_when_short() {
        assert_eq!(window_start(0, 20), 0);
        assert_eq!(window_start(6, 20), 0);
        assert_eq!(window_start(6, 6), 0);
    }

    #[test]
    fn test_window_start_drops_oldest_pairs() {
        assert_eq!(window_start(10, 4), 6);
    }

    #[test]
    fn test_window_start_rounds_odd_limit_to_whole_pairs() {
        assert_eq!(window_start(6, 3), 4);
        assert_eq!(window_start(6, 1), 6);
        assert_eq!(window_start(4, 0), 4);
    }
}
