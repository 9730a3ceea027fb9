//! Mute management commands.
//!
//! Commands for muting and unmuting users.

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::ChatPermissions;
use tracing::info;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::default_member_permissions;
use crate::utils::{resolve_target, user_mention};

use super::ban::{duration_arg, until};
use super::{reply_html, require, Privilege};

/// Handle /mute command.
pub async fn mute_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    mute_action(bot, msg, state, args, MuteMode::Forever).await
}

/// Handle /tmute <target> <duration>.
pub async fn tmute_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    mute_action(bot, msg, state, args, MuteMode::Temporary).await
}

/// Handle /unmute command.
pub async fn unmute_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    mute_action(bot, msg, state, args, MuteMode::Unmute).await
}

#[derive(Debug, PartialEq, Clone, Copy)]
enum MuteMode {
    Forever,
    Temporary,
    Unmute,
}

async fn mute_action(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
    mode: MuteMode,
) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Restrict).await? {
        return Ok(());
    }
    let chat_id = msg.chat.id;

    let Some((target, rest)) = resolve_target(&bot, &msg, &state, &args).await else {
        let key = match mode {
            MuteMode::Forever => "mute.usage",
            MuteMode::Temporary => "mute.tmute_usage",
            MuteMode::Unmute => "mute.unmute_usage",
        };
        reply_html(&bot, &msg, state.text(key)).await?;
        return Ok(());
    };

    if mode != MuteMode::Unmute && state.permissions.is_admin(chat_id, target.id).await {
        reply_html(&bot, &msg, state.text("mute.anti_admin")).await?;
        return Ok(());
    }

    let mention = user_mention(target.id.0, &target.name);

    let result = match mode {
        MuteMode::Forever => bot
            .restrict_chat_member(chat_id, target.id, ChatPermissions::empty())
            .await
            .map(|_| state.text("mute.muted").replace("{user}", &mention)),
        MuteMode::Temporary => {
            let (token, until_date) = match duration_arg(rest) {
                Some(Ok((token, duration))) => match until(Utc::now(), duration) {
                    Some(until_date) => (token, until_date),
                    None => {
                        let text = state
                            .text("common.invalid_duration")
                            .replace("{error}", &token);
                        reply_html(&bot, &msg, text).await?;
                        return Ok(());
                    }
                },
                Some(Err(e)) => {
                    let text = state
                        .text("common.invalid_duration")
                        .replace("{error}", &e.to_string());
                    reply_html(&bot, &msg, text).await?;
                    return Ok(());
                }
                None => {
                    reply_html(&bot, &msg, state.text("mute.duration_missing")).await?;
                    return Ok(());
                }
            };
            bot.restrict_chat_member(chat_id, target.id, ChatPermissions::empty())
                .until_date(until_date)
                .await
                .map(|_| {
                    state
                        .text("mute.tmuted")
                        .replace("{user}", &mention)
                        .replace("{duration}", &token)
                })
        }
        MuteMode::Unmute => bot
            .restrict_chat_member(chat_id, target.id, default_member_permissions())
            .await
            .map(|_| state.text("mute.unmuted").replace("{user}", &mention)),
    };

    match result {
        Ok(text) => {
            info!("{:?} {} in chat {}", mode, target.id, chat_id);
            reply_html(&bot, &msg, text).await?;
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
