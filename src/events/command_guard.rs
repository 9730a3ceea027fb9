//! Command guard wiring.
//!
//! Runs before the command handlers. A message the guard stops is consumed
//! here, so its handler never sees it.

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::debug;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::permissions::{CommandMessage, CommandSender, GuardVerdict};
use crate::utils::delete_silently;

/// Handler consuming commands the guard stops.
pub fn handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter_map_async(verdict).endpoint(enforce)
}

/// The guard's verdict, only when it stops the handler.
async fn verdict(msg: Message, state: AppState) -> Option<GuardVerdict> {
    let text = msg.text()?;

    let sender = match (&msg.sender_chat, &msg.from) {
        (Some(chat), _) if chat.id == msg.chat.id => CommandSender::ChatItself,
        (Some(_), _) => CommandSender::OtherChat,
        (None, Some(user)) => CommandSender::User(user.id),
        (None, None) => CommandSender::OtherChat,
    };

    let message = CommandMessage {
        chat_id: msg.chat.id,
        is_group: msg.chat.is_group() || msg.chat.is_supergroup(),
        sender,
        text,
    };

    let verdict = state
        .guard
        .evaluate(message, &state.permissions, state.storage.settings.as_ref())
        .await;
    verdict.stops_handler().then_some(verdict)
}

async fn enforce(bot: ThrottledBot, msg: Message, verdict: GuardVerdict) -> anyhow::Result<()> {
    debug!("Guard stopped message {} in {}: {:?}", msg.id, msg.chat.id, verdict);
    if verdict == GuardVerdict::Suppressed {
        delete_silently(&bot, msg.chat.id, msg.id).await;
    }
    Ok(())
}
