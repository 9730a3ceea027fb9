//! Chat lock commands.
//!
//! /lock and "chat kapat" close the chat for members (invites stay open).
//! /unlock and "chat aç" restore what was there before.

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::ChatPermissions;
use tracing::{info, warn};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{default_member_permissions, PermissionSnapshot};

use super::{reply_html, require, Privilege};

const LOCK_TRIGGER: &str = "chat kapat";
const UNLOCK_TRIGGER: &str = "chat aç";

/// Handle /lock command.
pub async fn lock_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    lock_chat(bot, msg, state).await
}

/// Handle /unlock command.
pub async fn unlock_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    unlock_chat(bot, msg, state).await
}

/// Plain-text lock triggers in groups.
pub fn text_trigger_handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter_map(|msg: Message| {
        if !(msg.chat.is_group() || msg.chat.is_supergroup()) {
            return None;
        }
        trigger_of(msg.text()?)
    })
    .endpoint(|bot: ThrottledBot, msg: Message, state: AppState, lock: bool| async move {
        if lock {
            lock_chat(bot, msg, state).await
        } else {
            unlock_chat(bot, msg, state).await
        }
    })
}

/// `Some(true)` for the lock phrase, `Some(false)` for the unlock phrase.
fn trigger_of(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        LOCK_TRIGGER => Some(true),
        UNLOCK_TRIGGER => Some(false),
        _ => None,
    }
}

async fn lock_chat(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Restrict).await? {
        return Ok(());
    }
    let chat_id = msg.chat.id;

    // Remember the current defaults so /unlock can put them back
    match bot.get_chat(chat_id).await {
        Ok(chat) => {
            if let Some(current) = chat.permissions() {
                let snapshot = PermissionSnapshot::from(current);
                if let Err(e) = state
                    .storage
                    .settings
                    .save_previous_permissions(chat_id.0, snapshot)
                    .await
                {
                    warn!("Failed to save permissions of {}: {}", chat_id, e);
                }
            }
        }
        Err(e) => warn!("Failed to read permissions of {}: {}", chat_id, e),
    }

    if let Err(e) = bot
        .set_chat_permissions(chat_id, ChatPermissions::INVITE_USERS)
        .await
    {
        reply_html(
            &bot,
            &msg,
            state.text("common.error").replace("{error}", &e.to_string()),
        )
        .await?;
        return Ok(());
    }

    if let Err(e) = state.storage.settings.set_locked(chat_id.0, true).await {
        warn!("Failed to store lock state of {}: {}", chat_id, e);
    }
    info!("Chat {} locked", chat_id);
    reply_html(&bot, &msg, state.text("lock.locked")).await?;

    Ok(())
}

async fn unlock_chat(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Restrict).await? {
        return Ok(());
    }
    let chat_id = msg.chat.id;

    let saved = match state.storage.settings.get_previous_permissions(chat_id.0).await {
        Ok(saved) => saved,
        Err(e) => {
            warn!("Failed to load saved permissions of {}: {}", chat_id, e);
            None
        }
    };
    let permissions = unlock_permissions(saved);

    if let Err(e) = bot.set_chat_permissions(chat_id, permissions).await {
        reply_html(
            &bot,
            &msg,
            state.text("common.error").replace("{error}", &e.to_string()),
        )
        .await?;
        return Ok(());
    }

    if saved.is_some() {
        if let Err(e) = state.storage.settings.clear_previous_permissions(chat_id.0).await {
            warn!("Failed to clear saved permissions of {}: {}", chat_id, e);
        }
    }
    if let Err(e) = state.storage.settings.set_locked(chat_id.0, false).await {
        warn!("Failed to store lock state of {}: {}", chat_id, e);
    }
    info!("Chat {} unlocked", chat_id);
    reply_html(&bot, &msg, state.text("lock.unlocked")).await?;

    Ok(())
}

/// Permissions to apply on unlock. Invites are always allowed.
fn unlock_permissions(saved: Option<PermissionSnapshot>) -> ChatPermissions {
    match saved {
        Some(snapshot) => snapshot.to_permissions() | ChatPermissions::INVITE_USERS,
        None => default_member_permissions(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triggers() {
        assert_eq!(trigger_of("chat kapat"), Some(true));
        assert_eq!(trigger_of("  CHAT KAPAT "), Some(true));
        assert_eq!(trigger_of("Chat aç"), Some(false));
        assert_eq!(trigger_of("chat kapatın"), None);
    }

    #[test]
    fn test_unlock_restores_snapshot_with_invites() {
        let snapshot = PermissionSnapshot::from(ChatPermissions::SEND_MESSAGES);
        let perms = unlock_permissions(Some(snapshot));
        assert!(perms.contains(ChatPermissions::SEND_MESSAGES));
        assert!(perms.contains(ChatPermissions::INVITE_USERS));
        assert!(!perms.contains(ChatPermissions::SEND_POLLS));
    }

    #[test]
    fn test_unlock_without_snapshot_uses_defaults() {
        assert_eq!(unlock_permissions(None), default_member_permissions());
    }
}
