//! Sticker and GIF approval.
//!
//! /approve lets one member send stickers, GIFs and inline bot results even
//! when the chat forbids them; /disapprove takes that back. Every other
//! permission of the member is kept.

use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, ChatPermissions, Restricted};
use tracing::info;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::default_member_permissions;
use crate::utils::{resolve_target, user_mention};

use super::{reply_html, require, Privilege};

/// Handle /approve.
pub async fn approve_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    set_sticker_permission(bot, msg, state, args, true).await
}

/// Handle /disapprove.
pub async fn disapprove_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    set_sticker_permission(bot, msg, state, args, false).await
}

/// Permissions of a restricted member.
fn restricted_permissions(r: &Restricted) -> ChatPermissions {
    let flags = [
        (r.can_send_messages, ChatPermissions::SEND_MESSAGES),
        (r.can_send_audios, ChatPermissions::SEND_AUDIOS),
        (r.can_send_documents, ChatPermissions::SEND_DOCUMENTS),
        (r.can_send_photos, ChatPermissions::SEND_PHOTOS),
        (r.can_send_videos, ChatPermissions::SEND_VIDEOS),
        (r.can_send_video_notes, ChatPermissions::SEND_VIDEO_NOTES),
        (r.can_send_voice_notes, ChatPermissions::SEND_VOICE_NOTES),
        (r.can_send_polls, ChatPermissions::SEND_POLLS),
        (r.can_send_other_messages, ChatPermissions::SEND_OTHER_MESSAGES),
        (r.can_add_web_page_previews, ChatPermissions::ADD_WEB_PAGE_PREVIEWS),
        (r.can_change_info, ChatPermissions::CHANGE_INFO),
        (r.can_invite_users, ChatPermissions::INVITE_USERS),
        (r.can_pin_messages, ChatPermissions::PIN_MESSAGES),
        (r.can_manage_topics, ChatPermissions::MANAGE_TOPICS),
    ];
    flags
        .into_iter()
        .filter(|(allowed, _)| *allowed)
        .fold(ChatPermissions::empty(), |acc, (_, flag)| acc | flag)
}

/// The member's current permissions with only the sticker flag changed.
///
/// Unrestricted members start from the chat's defaults.
fn with_sticker_permission(
    kind: &ChatMemberKind,
    chat_defaults: ChatPermissions,
    allowed: bool,
) -> ChatPermissions {
    let mut permissions = match kind {
        ChatMemberKind::Restricted(r) => restricted_permissions(r),
        _ => chat_defaults,
    };
    permissions.set(ChatPermissions::SEND_OTHER_MESSAGES, allowed);
    permissions
}

async fn set_sticker_permission(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
    allowed: bool,
) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Restrict).await? {
        return Ok(());
    }
    let chat_id = msg.chat.id;

    let Some((target, _)) = resolve_target(&bot, &msg, &state, &args).await else {
        let key = if allowed {
            "approve.usage"
        } else {
            "approve.disapprove_usage"
        };
        reply_html(&bot, &msg, state.text(key)).await?;
        return Ok(());
    };

    if state.permissions.is_admin(chat_id, target.id).await {
        let key = if allowed {
            "approve.anti_admin"
        } else {
            "approve.anti_admin_revoke"
        };
        reply_html(&bot, &msg, state.text(key)).await?;
        return Ok(());
    }

    let member = match bot.get_chat_member(chat_id, target.id).await {
        Ok(member) => member,
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
    if allowed && member.user.is_bot {
        reply_html(&bot, &msg, state.text("approve.no_bots")).await?;
        return Ok(());
    }

    let chat_defaults = match bot.get_chat(chat_id).await {
        Ok(chat) => chat.permissions().unwrap_or_else(default_member_permissions),
        Err(_) => default_member_permissions(),
    };
    let permissions = with_sticker_permission(&member.kind, chat_defaults, allowed);

    let mention = user_mention(target.id.0, &target.name);
    let text = match bot.restrict_chat_member(chat_id, target.id, permissions).await {
        Ok(_) => {
            info!(
                "Sticker permission of {} in chat {} set to {}",
                target.id, chat_id, allowed
            );
            let key = if allowed {
                "approve.approved"
            } else {
                "approve.disapproved"
            };
            state.text(key).replace("{user}", &mention)
        }
        Err(e) => state.text("common.error").replace("{error}", &e.to_string()),
    };
    reply_html(&bot, &msg, text).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::UntilDate;

    fn muted_with_photos() -> Restricted {
        Restricted {
            until_date: UntilDate::Forever,
            is_member: true,
            can_send_messages: false,
            can_send_audios: false,
            can_send_documents: false,
            can_send_photos: true,
            can_send_videos: false,
            can_send_video_notes: false,
            can_send_voice_notes: false,
            can_send_other_messages: false,
            can_add_web_page_previews: false,
            can_change_info: false,
            can_invite_users: true,
            can_pin_messages: false,
            can_manage_topics: false,
            can_send_polls: false,
        }
    }

    #[test]
    fn test_approve_keeps_existing_restrictions() {
        let kind = ChatMemberKind::Restricted(muted_with_photos());
        let permissions = with_sticker_permission(&kind, default_member_permissions(), true);
        assert_eq!(
            permissions,
            ChatPermissions::SEND_PHOTOS
                | ChatPermissions::INVITE_USERS
                | ChatPermissions::SEND_OTHER_MESSAGES
        );
    }

    #[test]
    fn test_unrestricted_member_starts_from_chat_defaults() {
        let defaults = ChatPermissions::SEND_MESSAGES | ChatPermissions::SEND_PHOTOS;
        assert_eq!(
            with_sticker_permission(&ChatMemberKind::Member, defaults, true),
            defaults | ChatPermissions::SEND_OTHER_MESSAGES
        );

        let with_stickers = defaults | ChatPermissions::SEND_OTHER_MESSAGES;
        assert_eq!(
            with_sticker_permission(&ChatMemberKind::Member, with_stickers, false),
            defaults
        );
    }
}
