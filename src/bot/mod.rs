//! Bot module - relays Telegram messages to Gemini.

pub mod command;
pub mod engine;
pub mod gemini;
pub mod message;
pub mod store;
pub mod telegram;
pub mod texts;
pub mod typing;


pub use engine::{Relay, RelayConfig};
pub use gemini::{GeminiClient, GenerationError, Generator};
pub use message::{Attachment, Inbound, InboundEvent, Role, Turn, UserProfile};
pub use store::{ConversationStore, Database, StoreError};
pub use telegram::{RenderMode, TelegramClient, Transport};
