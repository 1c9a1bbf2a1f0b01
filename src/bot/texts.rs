//! Static replies and keyboard labels.
//!
//! MarkdownV2 texts here are written pre-escaped and are sent as-is.

pub const BUTTON_LANGUAGES: &str = "🌐 Languages";
pub const BUTTON_ABOUT: &str = "📚 About";
pub const BUTTON_CONTACT: &str = "📞 Contact";
pub const BUTTON_NEW_CHAT: &str = "🆕 New chat";

/// Reply keyboard rows, one button per row.
pub const KEYBOARD: [&str; 4] = [BUTTON_LANGUAGES, BUTTON_ABOUT, BUTTON_CONTACT, BUTTON_NEW_CHAT];

pub const WELCOME: &str = "🤖 Welcome to *Mali*, your personal AI Assistant powered by Google's *Gemini*\\!\n\n\
🚀I excel in coding and writing tasks\\.\n\n\
🌐Explore *Supported Languages* for customization\\.\n\n\
🖼️ *Send me an image and ask anything*\\! I can provide insights based on images too\\.\n\n\
🆕 Tap *New chat* to start a fresh conversation\\.\n\n\
Ready\\? Ask me anything\\!";

pub const ABOUT: &str = "🚧 *About Mali v1\\.2* 🚧\n\n\
\\- 🤖 AI Assistant powered by Google's Gemini API\\.\n\
\\- 🎯 High accuracy in Q&A, coding, and creative writing\\.\n\
\\- 🛠 Markdown support for code snippets\\.\n\
\\- 📈 Capabilities: coding assistance, creative writing, and answering based on image context 🖼️\\.\n\
\\- 🔄 Remembers your conversation until you start a *New chat*\\.\n\
\\- 🗺 Explore *Supported Languages*\\.\n\
\\- 🔜 More features in development\\.\n\n\
🚀 Ready to assist\\! Ask anything\\!";

pub const CONTACT: &str = "📞 *Contact* 📞\n\n\
📧 *Email*: `mani@maniw\\.space`\n\
💡 *For Collaborations or Suggestions*\\: Feel free to reach out to us via email\\.";

const LANGUAGES: [&str; 38] = [
    "Arabic (ar)", "Bengali (bn)", "Bulgarian (bg)",
    "Chinese (zh) [Simplified and Traditional]", "Croatian (hr)", "Czech (cs)",
    "Danish (da)", "Dutch (nl)", "English (en)",
    "Estonian (et)", "Finnish (fi)", "French (fr)",
    "German (de)", "Greek (el)", "Hebrew (iw)",
    "Hindi (hi)", "Hungarian (hu)", "Indonesian (id)",
    "Italian (it)", "Japanese (ja)", "Korean (ko)",
    "Latvian (lv)", "Lithuanian (lt)", "Norwegian (no)",
    "Polish (pl)", "Portuguese (pt)", "Romanian (ro)",
    "Russian (ru)", "Serbian (sr)", "Slovak (sk)",
    "Slovenian (sl)", "Spanish (es)", "Swahili (sw)",
    "Swedish (sv)", "Thai (th)", "Turkish (tr)",
    "Ukrainian (uk)", "Vietnamese (vi)",
];

/// Plain text, sent without a parse mode.
pub fn languages() -> String {
    format!(
        "Gemini supports the following languages:\n\n- {}\n\nIf your language is not listed, please use the English language for the best results.❤️‍🔥",
        LANGUAGES.join("\n- ")
    )
}

pub const HISTORY_CLEARED: &str = "🆕 Started a new chat. Previous messages are forgotten.";
pub const HISTORY_CLEAR_FAILED: &str = "Sorry, I couldn't clear the conversation❌. Please try again.";

pub const DEFAULT_PHOTO_PROMPT: &str = "Nothing provided, just say what you see";

pub const PROMPT_FAILED: &str =
    "Sorry, I encountered an error while processing your request❌. Maybe your prompt is NSFW🔞 or not in a supported language🌐.";
pub const PHOTO_FAILED: &str = "Sorry, I encountered an error while processing your photo❌. Please try again.";

pub const BROADCAST_ASK: &str = "📣 Send the message to broadcast, or /cancel.";
pub const BROADCAST_ALREADY_WAITING: &str = "📣 Still waiting for the broadcast text, or /cancel.";
pub const BROADCAST_CANCELLED: &str = "Broadcast cancelled.";
pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";

pub fn broadcast_report(delivered: usize, total: usize) -> String {
    format!("📣 Broadcast delivered to {delivered} of {total} users.")
}

pub fn stats_report(users: usize) -> String {
    format!("📊 Known users: {users}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_languages_lists_every_entry() {
        let text = languages();
        for lang in LANGUAGES {
            assert!(text.contains(&format!("- {lang}")), "missing {lang}");
        }
        assert!(text.starts_with("Gemini supports"));
    }

    #[test]
    fn test_keyboard_labels_have_no_padding() {
        for label in KEYBOARD {
            assert_eq!(label, label.trim());
        }
    }

    #[test]
    fn test_reports() {
        assert_eq!(broadcast_report(2, 3), "📣 Broadcast delivered to 2 of 3 users.");
        assert_eq!(stats_report(5), "📊 Known users: 5");
    }
}
