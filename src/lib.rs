//! Mali: a Telegram bot that relays chats and photos to Gemini.

pub mod bot;
pub mod config;
pub mod markdown;
