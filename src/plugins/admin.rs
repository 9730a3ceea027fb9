//! Admin commands.
//!
//! /adminonly toggles the command guard's policy, /admins lists administrators.

use teloxide::prelude::*;
use teloxide::types::ChatMemberKind;
use tracing::{error, info};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::utils::{parse_toggle, user_mention};

use super::{reply_html, require, Privilege};

/// Handle /adminonly [on|off].
///
/// Without arguments the current mode is shown and nothing changes.
pub async fn adminonly_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let chat_id = msg.chat.id.0;
    let Some(arg) = args.split_whitespace().next() else {
        let text = match state.storage.settings.get_settings(chat_id).await {
            Ok(settings) => {
                let status = if settings.admin_only_commands {
                    state.text("common.on")
                } else {
                    state.text("common.off")
                };
                state.text("adminonly.status").replace("{status}", &status)
            }
            Err(e) => {
                error!("Failed to load settings for {}: {}", chat_id, e);
                state.text("common.storage_error")
            }
        };
        reply_html(&bot, &msg, text).await?;
        return Ok(());
    };

    let Some(enabled) = parse_toggle(arg) else {
        reply_html(&bot, &msg, state.text("adminonly.invalid")).await?;
        return Ok(());
    };

    let key = match state.storage.settings.set_admin_only_mode(chat_id, enabled).await {
        Ok(()) => {
            info!("Admin-only mode {} in chat {}", enabled, chat_id);
            if enabled {
                "adminonly.enabled"
            } else {
                "adminonly.disabled"
            }
        }
        Err(e) => {
            error!("Failed to set admin-only mode in {}: {}", chat_id, e);
            "common.storage_error"
        }
    };
    reply_html(&bot, &msg, state.text(key)).await?;

    Ok(())
}

/// Handle /admins - list human administrators, creator first.
pub async fn admins_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let admins = match bot.get_chat_administrators(msg.chat.id).await {
        Ok(admins) => admins,
        Err(e) => {
            reply_html(
                &bot,
                &msg,
                state.text("common.error").replace("{error}", &e.to_string()),
            )
            .await?;
            return Ok(());
        }
    };

    let mut admins: Vec<_> = admins.into_iter().filter(|m| !m.user.is_bot).collect();
    admins.sort_by_key(|m| !matches!(m.kind, ChatMemberKind::Owner(_)));

    let mut text = state.text("admins.header");
    text.push_str("\n\n");
    for member in &admins {
        let role = if matches!(member.kind, ChatMemberKind::Owner(_)) {
            state.text("admins.owner")
        } else {
            state.text("admins.admin")
        };
        text.push_str(&format!(
            "{}: {}\n",
            role,
            user_mention(member.user.id.0, &member.user.first_name)
        ));
    }

    reply_html(&bot, &msg, text).await?;
    Ok(())
}
