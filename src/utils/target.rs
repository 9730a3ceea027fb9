//! Target resolution for moderation commands.
//!
//! A target comes from, in order: the replied-to message, a numeric ID,
//! a text mention, or an `@username` known to the member store.

use teloxide::prelude::*;
use teloxide::types::{Message, MessageEntityKind, UserId};
use tracing::debug;

use crate::bot::dispatcher::{AppState, ThrottledBot};

/// A resolved target user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: UserId,
    pub name: String,
}

/// Resolve the target of a command and return the remaining arguments.
///
/// `args` is the command text without the command itself.
pub async fn resolve_target<'a>(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    args: &'a str,
) -> Option<(Target, &'a str)> {
    if let Some(user) = msg.reply_to_message().and_then(|r| r.from.as_ref()) {
        let target = Target {
            id: user.id,
            name: user.first_name.clone(),
        };
        return Some((target, args.trim()));
    }

    let args = args.trim();
    let (first, rest) = match args.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim_start()),
        None => (args, ""),
    };
    if first.is_empty() {
        return None;
    }

    if let Ok(id) = first.parse::<u64>() {
        let name = bot
            .get_chat_member(msg.chat.id, UserId(id))
            .await
            .map(|m| m.user.first_name)
            .unwrap_or_else(|_| id.to_string());
        return Some((Target { id: UserId(id), name }, rest));
    }

    if let Some(user) = msg.entities().and_then(|entities| {
        entities.iter().find_map(|e| match &e.kind {
            MessageEntityKind::TextMention { user } => Some(user.clone()),
            _ => None,
        })
    }) {
        let target = Target {
            id: user.id,
            name: user.first_name.clone(),
        };
        return Some((target, rest));
    }

    if let Some(username) = first.strip_prefix('@') {
        match state.storage.members.find_by_username(msg.chat.id.0, username).await {
            Ok(Some(member)) => {
                let name = member.first_name.unwrap_or_else(|| first.to_string());
                let target = Target {
                    id: UserId(member.user_id),
                    name,
                };
                return Some((target, rest));
            }
            Ok(None) => debug!("Username {} not in member store", first),
            Err(e) => debug!("Member lookup for {} failed: {}", first, e),
        }

        // Public usernames resolve through getChat
        if let Ok(chat) = bot.get_chat(first.to_string()).await {
            if chat.is_private() {
                let name = chat.first_name().unwrap_or(username).to_string();
                let target = Target {
                    id: UserId(chat.id.0 as u64),
                    name,
                };
                return Some((target, rest));
            }
        }
    }

    None
}
