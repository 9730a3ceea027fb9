//! Utility functions.
//!
//! Collection of helper functions used across the bot.

pub mod parser;
pub mod render;
pub mod target;

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::MessageId;
use tracing::debug;

use crate::bot::dispatcher::ThrottledBot;

pub use parser::{
    html_escape, parse_buttons, parse_duration, parse_filter_definition, parse_toggle,
    DurationError,
};
pub use render::{
    build_keyboard, render_filter_response, render_text, user_mention, FillingContext, Rendered,
    Sender,
};
pub use target::resolve_target;

/// Delete a message, ignoring failures (already deleted, missing rights).
pub async fn delete_silently(bot: &ThrottledBot, chat_id: ChatId, message_id: MessageId) {
    if let Err(e) = bot.delete_message(chat_id, message_id).await {
        debug!("Could not delete message {} in {}: {}", message_id, chat_id, e);
    }
}

/// Delete a message after a delay without holding up the caller.
pub fn delete_later(bot: ThrottledBot, chat_id: ChatId, message_id: MessageId, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        delete_silently(&bot, chat_id, message_id).await;
    });
}
