//! Purge command handlers.
//!
//! Commands for deleting messages in bulk.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::MessageId;
use tracing::{debug, info};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::utils::{delete_later, delete_silently};

use super::{reply_html, require, Privilege};

/// Telegram accepts at most this many IDs per deleteMessages call.
const DELETE_BATCH: usize = 100;
/// How long the purge status stays visible.
const STATUS_TTL: Duration = Duration::from_secs(3);

/// Handle /purge - delete from the replied message up to the command.
pub async fn purge_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Delete).await? {
        return Ok(());
    }

    let Some(reply) = msg.reply_to_message() else {
        reply_html(&bot, &msg, state.text("purge.usage")).await?;
        return Ok(());
    };

    let ids = purge_range(reply.id, msg.id);
    let deleted = delete_messages_batch(&bot, msg.chat.id, &ids).await;
    info!("Purged {} messages in chat {}", deleted, msg.chat.id);

    let status = bot
        .send_message(
            msg.chat.id,
            state.text("purge.done").replace("{count}", &deleted.to_string()),
        )
        .await?;
    delete_later(bot, msg.chat.id, status.id, STATUS_TTL);

    Ok(())
}

/// Handle /del - delete the replied message and the command.
pub async fn del_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Delete).await? {
        return Ok(());
    }

    let Some(reply) = msg.reply_to_message() else {
        reply_html(&bot, &msg, state.text("purge.del_usage")).await?;
        return Ok(());
    };

    delete_silently(&bot, msg.chat.id, reply.id).await;
    delete_silently(&bot, msg.chat.id, msg.id).await;

    Ok(())
}

/// Every message ID from `from` to `to`, both included.
fn purge_range(from: MessageId, to: MessageId) -> Vec<MessageId> {
    let (start, end) = if from.0 <= to.0 {
        (from.0, to.0)
    } else {
        (to.0, from.0)
    };
    (start..=end).map(MessageId).collect()
}

/// Delete in batches, falling back to one by one when a batch is refused.
async fn delete_messages_batch(bot: &ThrottledBot, chat_id: ChatId, ids: &[MessageId]) -> usize {
    let mut deleted = 0;

    for chunk in ids.chunks(DELETE_BATCH) {
        match bot.delete_messages(chat_id, chunk.to_vec()).await {
            Ok(_) => deleted += chunk.len(),
            Err(e) => {
                debug!("Batch delete failed in {}: {}, deleting one by one", chat_id, e);
                for &id in chunk {
                    if bot.delete_message(chat_id, id).await.is_ok() {
                        deleted += 1;
                    }
                }
            }
        }
    }

    deleted
}
