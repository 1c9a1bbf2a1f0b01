//! Telegram transport using teloxide.

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId, KeyboardButton, KeyboardMarkup, ParseMode};
use tracing::{info, warn};

use crate::bot::message::Attachment;

/// How Telegram should render an outgoing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Plain,
    MarkdownV2,
}

/// Outbound side of the bot, as seen by the relay.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str, mode: RenderMode) -> Result<(), String>;

    /// Send `text` with a persistent reply keyboard, one button per row.
    async fn send_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        mode: RenderMode,
        buttons: &[&str],
    ) -> Result<(), String>;

    /// Show the "typing…" indicator.
    async fn send_typing(&self, chat_id: i64) -> Result<(), String>;

    async fn download_attachment(&self, file_id: &str) -> Result<Attachment, String>;
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn keyboard(buttons: &[&str]) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = buttons.iter().map(|b| vec![KeyboardButton::new(*b)]).collect();
    KeyboardMarkup::new(rows).resize_keyboard()
}

/// Telegram serves photos as .jpg; anything else is guessed from the extension.
fn media_type_for(file_path: &str) -> &'static str {
    if file_path.ends_with(".png") {
        "image/png"
    } else if file_path.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str, mode: RenderMode) -> Result<(), String> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if mode == RenderMode::MarkdownV2 {
            request = request.parse_mode(ParseMode::MarkdownV2);
        }

        request.await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }

    async fn send_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        mode: RenderMode,
        buttons: &[&str],
    ) -> Result<(), String> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .reply_markup(keyboard(buttons));
        if mode == RenderMode::MarkdownV2 {
            request = request.parse_mode(ParseMode::MarkdownV2);
        }

        request.await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to send keyboard: {e}");
            warn!("{}", msg);
            msg
        })
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), String> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to send typing: {e}"))
    }

    async fn download_attachment(&self, file_id: &str) -> Result<Attachment, String> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| format!("Failed to get file info: {e}"))?;

        let mut data = Vec::new();
        self.bot
            .download_file(&file.path, &mut data)
            .await
            .map_err(|e| format!("Failed to download file: {e}"))?;

        let mime_type = media_type_for(&file.path).to_string();
        info!("📥 Downloaded attachment ({} bytes, {})", data.len(), mime_type);
        Ok(Attachment { data, mime_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_for() {
        assert_eq!(media_type_for("photos/file_1.jpg"), "image/jpeg");
        assert_eq!(media_type_for("photos/file_2.png"), "image/png");
        assert_eq!(media_type_for("stickers/file_3.webp"), "image/webp");
        assert_eq!(media_type_for("photos/file_4"), "image/jpeg");
    }

    #[test]
    fn test_keyboard_one_button_per_row() {
        let markup = keyboard(&["a", "b", "c"]);
        assert_eq!(markup.keyboard.len(), 3);
        assert!(markup.keyboard.iter().all(|row| row.len() == 1));
        assert_eq!(markup.keyboard[1][0].text, "b");
    }
}
