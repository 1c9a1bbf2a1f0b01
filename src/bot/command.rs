//! Inbound classification and the per-admin dispatch state machine.
//!
//! Text is classified once into a [`Command`]; [`dispatch`] then maps the
//! current [`AdminSession`] and the inbound payload to the next session and
//! the [`Action`] the relay should perform. Both are pure.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use regex::Regex;

use crate::bot::message::Inbound;
use crate::bot::texts;

/// Menu entries reachable by everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    Start,
    About,
    Languages,
    Contact,
    NewChat,
}

/// Commands only recognised for configured admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    Broadcast,
    Cancel,
    Stats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Menu(MenuCommand),
    Prompt(String),
    Admin(AdminCommand),
}

/// `/name` or `/name@botname`, optionally followed by arguments.
static SLASH_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/([A-Za-z_]+)(?:@\w+)?(?:\s|$)").expect("valid command regex"));

/// Classify inbound text. Admin commands from non-admins are plain prompts.
pub fn classify(text: &str, is_admin: bool) -> Command {
    let trimmed = text.trim();

    match trimmed {
        texts::BUTTON_ABOUT => return Command::Menu(MenuCommand::About),
        texts::BUTTON_LANGUAGES => return Command::Menu(MenuCommand::Languages),
        texts::BUTTON_CONTACT => return Command::Menu(MenuCommand::Contact),
        texts::BUTTON_NEW_CHAT => return Command::Menu(MenuCommand::NewChat),
        _ => {}
    }

    if let Some(caps) = SLASH_COMMAND.captures(trimmed) {
        let name = caps[1].to_ascii_lowercase();
        let menu = match name.as_str() {
            "start" => Some(MenuCommand::Start),
            "about" => Some(MenuCommand::About),
            "languages" => Some(MenuCommand::Languages),
            "contact" => Some(MenuCommand::Contact),
            "reset" | "new" => Some(MenuCommand::NewChat),
            _ => None,
        };
        if let Some(menu) = menu {
            return Command::Menu(menu);
        }

        if is_admin {
            let admin = match name.as_str() {
                "broadcast" => Some(AdminCommand::Broadcast),
                "cancel" => Some(AdminCommand::Cancel),
                "stats" => Some(AdminCommand::Stats),
                _ => None,
            };
            if let Some(admin) = admin {
                return Command::Admin(admin);
            }
        }
    }

    Command::Prompt(text.to_string())
}

/// Broadcast progress for one admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminSession {
    #[default]
    Idle,
    AwaitingBroadcast,
}

/// What the relay should do for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Menu(MenuCommand),
    /// Fixed plain-text reply.
    Notice(&'static str),
    Generate { prompt: String, photo: Option<String> },
    Broadcast(String),
    Stats,
}

/// Pure transition: (session, inbound) -> (next session, action).
pub fn dispatch(session: AdminSession, inbound: &Inbound, is_admin: bool) -> (AdminSession, Action) {
    let text = match inbound {
        Inbound::Photo { file_id, caption } => {
            let prompt = caption
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(texts::DEFAULT_PHOTO_PROMPT)
                .to_string();
            let action = Action::Generate { prompt, photo: Some(file_id.clone()) };
            return (session, action);
        }
        Inbound::Text(text) => text,
    };

    let command = classify(text, is_admin);
    match (session, command) {
        (AdminSession::AwaitingBroadcast, Command::Admin(AdminCommand::Cancel)) => {
            (AdminSession::Idle, Action::Notice(texts::BROADCAST_CANCELLED))
        }
        (AdminSession::AwaitingBroadcast, Command::Admin(AdminCommand::Broadcast)) => {
            (AdminSession::AwaitingBroadcast, Action::Notice(texts::BROADCAST_ALREADY_WAITING))
        }
        (AdminSession::AwaitingBroadcast, _) => (AdminSession::Idle, Action::Broadcast(text.clone())),

        (AdminSession::Idle, Command::Admin(AdminCommand::Broadcast)) => {
            (AdminSession::AwaitingBroadcast, Action::Notice(texts::BROADCAST_ASK))
        }
        (AdminSession::Idle, Command::Admin(AdminCommand::Cancel)) => {
            (AdminSession::Idle, Action::Notice(texts::NOTHING_TO_CANCEL))
        }
        (AdminSession::Idle, Command::Admin(AdminCommand::Stats)) => (AdminSession::Idle, Action::Stats),
        (AdminSession::Idle, Command::Menu(menu)) => (AdminSession::Idle, Action::Menu(menu)),
        (AdminSession::Idle, Command::Prompt(prompt)) => {
            (AdminSession::Idle, Action::Generate { prompt, photo: None })
        }
    }
}

/// Per-user admin sessions. Users without an entry are idle.
#[derive(Default)]
pub struct Sessions {
    inner: Mutex<HashMap<i64, AdminSession>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: i64) -> AdminSession {
        let sessions = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(&user_id).copied().unwrap_or_default()
    }

    pub fn set(&self, user_id: i64, session: AdminSession) {
        let mut sessions = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match session {
            AdminSession::Idle => {
                sessions.remove(&user_id);
            }
            other => {
                sessions.insert(user_id, other);
            }
        }
    }
}
