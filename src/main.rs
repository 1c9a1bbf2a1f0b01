use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatKind;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use mali::bot::{
    Database, GeminiClient, Inbound, InboundEvent, Relay, RelayConfig, TelegramClient, UserProfile,
};
use mali::config::Config;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "mali.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("mali.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting mali...");
    info!("Loaded config from {config_path}");
    info!("Admin IDs: {:?}", config.admin_ids);

    let bot = Bot::new(&config.telegram_bot_token);
    match bot.get_me().await {
        Ok(me) => info!("Bot user ID: {}, username: @{}", me.id, me.username()),
        Err(e) => {
            error!("Failed to reach Telegram: {e}");
            std::process::exit(1);
        }
    }

    let relay = match build_relay(&config, &bot) {
        Ok(relay) => Arc::new(relay),
        Err(e) => {
            error!("Failed to start: {e}");
            std::process::exit(1);
        }
    };

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    info!("Bot is up and running!");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn build_relay(config: &Config, bot: &Bot) -> Result<Relay, Box<dyn std::error::Error>> {
    let generator = GeminiClient::new(
        config.gemini_api_key.clone(),
        config.api_base.clone(),
        config.text_model.clone(),
        config.vision_model.clone(),
        config.request_timeout,
    )?;
    let store = Database::open(&config.database_path())?;
    let telegram = TelegramClient::new(bot.clone());

    let relay_config = RelayConfig {
        admin_ids: config.admin_ids.iter().map(|id| id.0 as i64).collect(),
        typing_interval: config.typing_interval,
        history_turns: config.history_turns,
        reserved_chars: config.reserved_chars.clone(),
    };

    Ok(Relay::new(
        relay_config,
        Arc::new(generator),
        Arc::new(store),
        Arc::new(telegram),
    ))
}

async fn handle_message(msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    // Private chats only
    if !matches!(msg.chat.kind, ChatKind::Private(_)) {
        return Ok(());
    }

    if let Some(event) = telegram_to_event(&msg) {
        relay.handle(event).await;
    }
    Ok(())
}

fn telegram_to_event(msg: &Message) -> Option<InboundEvent> {
    let user = msg.from.as_ref()?;
    let sender = UserProfile {
        user_id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
    };

    let inbound = if let Some(text) = msg.text() {
        Inbound::Text(text.to_string())
    } else if let Some(photo) = msg.photo() {
        // Sizes are ordered smallest to largest.
        let largest = photo.last()?;
        Inbound::Photo {
            file_id: largest.file.id.0.clone(),
            caption: msg.caption().map(str::to_string),
        }
    } else {
        return None;
    };

    Some(InboundEvent {
        chat_id: msg.chat.id.0,
        sender,
        inbound,
    })
}
