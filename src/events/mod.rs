//! Event handler system.
//!
//! Add new event handlers by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_event;` below
//! 3. Adding the handler to `message_event_handler()` or the dispatcher schema

pub mod command_guard;
pub mod filters;
pub mod welcome;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{debug, error};

use crate::bot::dispatcher::{AppState, ThrottledBot};

/// Build the message event handler.
///
/// Group messages that are not one of our commands go through the filters.
pub fn message_event_handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message, state: AppState| {
        (msg.chat.is_group() || msg.chat.is_supergroup()) && state.guard.in_scope(msg.chat.id)
    })
    .endpoint(unified_message_handler)
}

/// Unified message handler. Errors are logged here so one bad message never
/// reaches the dispatcher's error handler.
async fn unified_message_handler(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    let Some(text) = msg.text().or_else(|| msg.caption()) else {
        return Ok(());
    };

    // Commands that failed to parse (extra args on a bare command) land here
    if state.guard.command_name(text).is_some() {
        return Ok(());
    }

    debug!(
        "Message in chat {}: '{}'",
        msg.chat.id,
        text.chars().take(30).collect::<String>()
    );

    if let Err(e) = filters::check_filters(&bot, &msg, &state).await {
        error!("Filters error in {}: {}", msg.chat.id, e);
    }

    Ok(())
}
