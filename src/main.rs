//! Harley - Telegram group management bot
//!
//! Keyword filters with rich responses, admin-only command mode, moderation,
//! chat locking, welcomes and member tagging.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - Storage traits, MongoDB and in-memory backends
//! - `cache` - Read-through caching with Moka
//! - `permissions` - Live admin checks and the command guard
//! - `bot` - Dispatcher and runtime (with Throttle for API rate limiting)
//! - `plugins` - Command handlers
//! - `events` - Filters, welcomes and other non-command handlers
//! - `i18n` - Reply texts
//! - `utils` - Parsing and rendering helpers

mod bot;
mod cache;
mod config;
mod database;
mod events;
mod i18n;
mod permissions;
mod plugins;
mod utils;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bot::dispatcher::AppState;
use config::Config;
use database::Storage;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("harley=info,teloxide=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Harley bot...");

    let config = Config::from_env()?;
    info!("Configuration loaded, bot mode: {:?}", config.bot_mode);

    i18n::init();

    let storage = Storage::open(&config).await?;
    info!("Storage ready");

    // Throttle keeps us inside Telegram's per-chat and global rate limits
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());

    let me = bot.get_me().await?;
    let bot_username = config
        .bot_username
        .clone()
        .unwrap_or_else(|| me.username().to_string());
    info!("Using bot username: @{}", bot_username);

    if config.owner_ids.is_empty() {
        info!("No owner IDs configured (OWNER_IDS is empty)");
    } else {
        info!("Bot owners: {:?}", config.owner_ids);
    }
    match config.allowed_group_id {
        Some(chat_id) => info!("Serving only chat {}", chat_id),
        None => info!("Serving all chats"),
    }

    let state = AppState::new(&bot, storage.clone(), &config, bot_username);
    let dispatcher = bot::build_dispatcher(bot.clone(), state);

    let result = bot::run(&config, dispatcher, bot).await;

    storage.close().await;
    info!("Shut down");

    result
}
