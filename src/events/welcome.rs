//! Welcome event handler.
//!
//! Greets members joining a group when welcomes are enabled.

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::ChatMemberUpdated;
use tracing::{debug, info, warn};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::Member;
use crate::utils::{render_text, FillingContext, Rendered, Sender};

use super::filters::send_response;

/// Returns the handler for new member events.
pub fn handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|update: ChatMemberUpdated, state: AppState| {
        is_new_member(&update) && state.guard.in_scope(update.chat.id)
    })
    .endpoint(welcome_handler)
}

/// A non-bot user who was not in the chat before and is now.
fn is_new_member(update: &ChatMemberUpdated) -> bool {
    let joined = !update.old_chat_member.is_present() && update.new_chat_member.is_present();
    joined && !update.new_chat_member.user.is_bot
}

async fn welcome_handler(
    bot: ThrottledBot,
    update: ChatMemberUpdated,
    state: AppState,
) -> anyhow::Result<()> {
    let chat = &update.chat;
    let user = &update.new_chat_member.user;
    debug!("New member {} joined chat {}", user.id, chat.id);

    let member = Member::from_telegram(chat.id.0, user);
    if let Err(e) = state.storage.members.save_member(member).await {
        warn!("Failed to save member {} in {}: {}", user.id, chat.id, e);
    }

    let settings = state.storage.settings.get_settings(chat.id.0).await?;
    if !settings.welcome_enabled {
        debug!("Welcome disabled for chat {}", chat.id);
        return Ok(());
    }

    let template = settings
        .welcome_message
        .unwrap_or_else(|| state.text("welcome.default_message"));
    let ctx = FillingContext {
        sender: Sender::from(user),
        chat_title: chat.title().map(str::to_string),
    };
    let (text, buttons) = render_text(&template, &ctx, &mut rand::thread_rng());
    let rendered = Rendered {
        text,
        caption: None,
        buttons,
    };

    send_response(&bot, chat.id, None, &rendered, None).await?;
    info!("Welcomed {} in chat {}", user.id, chat.id);

    Ok(())
}
