//! Conversation and inbound message types.

use serde::{Deserialize, Serialize};

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "model" => Some(Role::Model),
            _ => None,
        }
    }
}

/// One message in a user's transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }
}

/// Who sent an inbound message, as recorded in the users table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

impl UserProfile {
    /// "@username" if set, otherwise the first name.
    pub fn display(&self) -> String {
        match &self.username {
            Some(u) => format!("@{u}"),
            None => self.first_name.clone(),
        }
    }
}

/// A downloaded file handed to the model inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Payload of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    /// `file_id` is the largest available photo size.
    Photo { file_id: String, caption: Option<String> },
}

/// An inbound message after it has been pulled out of the Telegram update.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub sender: UserProfile,
    pub inbound: Inbound,
}
