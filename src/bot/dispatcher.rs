//! Message dispatcher setup.
//!
//! Builds the dispatcher with all command handlers and event handlers.

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::debug;

use crate::config::Config;
use crate::database::{Member, Storage};
use crate::events;
use crate::i18n::{self, get_text};
use crate::permissions::{CommandGuard, Permissions};
use crate::plugins::{self, tagger::TagRegistry, Command};

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Filter, settings and member stores.
    pub storage: Storage,

    /// Live admin/privilege checks.
    pub permissions: Permissions,

    /// Admin-only command policy.
    pub guard: Arc<CommandGuard>,

    /// Tag loops running in this process.
    pub tags: TagRegistry,

    /// Bot username (without @).
    pub bot_username: String,

    /// Reply language.
    pub locale: String,
}

impl AppState {
    /// Create a new application state.
    pub fn new(bot: &ThrottledBot, storage: Storage, config: &Config, bot_username: String) -> Self {
        // Permissions needs the inner Bot for API calls
        let permissions = Permissions::new(Arc::new(bot.inner().clone()), config.owner_ids.clone());

        let commands = Command::bot_commands()
            .into_iter()
            .map(|c| c.command)
            .collect::<Vec<_>>();
        let guard = CommandGuard::new(commands, &bot_username, config.allowed_group_id);

        let locale = if i18n::is_supported(&config.language) {
            config.language.clone()
        } else {
            "tr".to_string()
        };

        Self {
            storage,
            permissions,
            guard: Arc::new(guard),
            tags: TagRegistry::default(),
            bot_username,
            locale,
        }
    }

    /// Reply text in the configured language.
    pub fn text(&self, key: &str) -> String {
        get_text(&self.locale, key)
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    state: AppState,
) -> Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey> {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    // Member tracking first, then the guard, commands, text triggers, events
    let message_handler = Update::filter_message()
        .inspect_async(track_member)
        .branch(events::command_guard::handler())
        .branch(plugins::command_handler())
        .branch(plugins::lock::text_trigger_handler())
        .branch(events::message_event_handler());

    // Chat member events (welcome new members)
    let member_handler = Update::filter_chat_member().branch(events::welcome::handler());

    dptree::entry()
        .branch(message_handler)
        .branch(member_handler)
}

/// Remember who writes in a group (runs before all handlers).
async fn track_member(msg: Message, state: AppState) {
    if !(msg.chat.is_group() || msg.chat.is_supergroup()) || !state.guard.in_scope(msg.chat.id) {
        return;
    }
    let Some(user) = msg.from.as_ref().filter(|u| !u.is_bot) else {
        return;
    };

    let member = Member::from_telegram(msg.chat.id.0, user);
    let members = state.storage.members.clone();
    tokio::spawn(async move {
        if let Err(e) = members.save_member(member).await {
            debug!("Failed to save member: {}", e);
        }
    });
}
