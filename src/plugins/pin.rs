//! Pin management commands.

use teloxide::prelude::*;
use tracing::info;

use crate::bot::dispatcher::{AppState, ThrottledBot};

use super::{reply_html, require, Privilege};

/// Handle /pin - pin the replied message.
///
/// Pins silently unless the argument contains `loud` or `notify`.
pub async fn pin_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Pin).await? {
        return Ok(());
    }

    let Some(reply) = msg.reply_to_message() else {
        reply_html(&bot, &msg, state.text("pin.usage")).await?;
        return Ok(());
    };

    let notify = wants_notification(&args);
    match bot
        .pin_chat_message(msg.chat.id, reply.id)
        .disable_notification(!notify)
        .await
    {
        Ok(_) => {
            info!("Pinned message {} in chat {} (notify: {})", reply.id, msg.chat.id, notify);
            reply_html(&bot, &msg, state.text("pin.pinned")).await?;
        }
        Err(e) => {
            reply_html(
                &bot,
                &msg,
                state.text("common.error").replace("{error}", &e.to_string()),
            )
            .await?;
        }
    }

    Ok(())
}

/// Handle /unpin - unpin the replied message, or the latest pin without a reply.
pub async fn unpin_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Pin).await? {
        return Ok(());
    }

    let mut request = bot.unpin_chat_message(msg.chat.id);
    if let Some(reply) = msg.reply_to_message() {
        request = request.message_id(reply.id);
    }

    let text = match request.await {
        Ok(_) => state.text("pin.unpinned"),
        Err(e) => state.text("common.error").replace("{error}", &e.to_string()),
    };
    reply_html(&bot, &msg, text).await?;

    Ok(())
}

fn wants_notification(args: &str) -> bool {
    args.split_whitespace()
        .any(|a| a.eq_ignore_ascii_case("loud") || a.eq_ignore_ascii_case("notify"))
}
