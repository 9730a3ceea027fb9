//! /start, /help, /id, /info and /connect.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, ReplyParameters};
use tracing::debug;
use url::Url;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::utils::html_escape;

use super::{reply_html, require, Privilege};

/// Deep-link payload prefix of /connect buttons.
const CONNECT_PREFIX: &str = "connect_";

/// Handle the /start command.
///
/// In private chats this is the bot's introduction with an "add to group"
/// button, or the landing of a /connect deep link.
pub async fn start_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !msg.chat.is_private() {
        reply_html(&bot, &msg, state.text("start.group")).await?;
        return Ok(());
    }
    if args.trim().starts_with(CONNECT_PREFIX) {
        return connect_landing(&bot, &msg, &state, &args).await;
    }

    let name = msg
        .from
        .as_ref()
        .map(|u| u.first_name.as_str())
        .unwrap_or_default();
    let text = state.text("start.private").replace("{name}", &html_escape(name));

    let mut request = bot
        .send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id));
    if let Some(url) = add_to_group_url(&state.bot_username) {
        request = request.reply_markup(InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::url(state.text("start.add_button"), url),
        ]]));
    }
    request.await?;

    Ok(())
}

/// Handle the /help command.
pub async fn help_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    reply_html(&bot, &msg, state.text("help.text")).await?;
    Ok(())
}

/// Handle the /id command - sender, replied user and chat IDs.
pub async fn id_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let mut lines = Vec::new();

    if let Some(user) = msg.from.as_ref() {
        lines.push(
            state
                .text("id.user")
                .replace("{name}", &html_escape(&user.full_name()))
                .replace("{id}", &user.id.to_string()),
        );
    }

    if let Some(replied) = msg.reply_to_message().and_then(|r| r.from.as_ref()) {
        lines.push(
            state
                .text("id.replied")
                .replace("{name}", &html_escape(&replied.full_name()))
                .replace("{id}", &replied.id.to_string()),
        );
    }

    if !msg.chat.is_private() {
        lines.push(state.text("id.chat").replace("{id}", &msg.chat.id.to_string()));
    }

    reply_html(&bot, &msg, lines.join("\n")).await?;
    Ok(())
}

/// Handle /info - details of the sender or the replied user.
pub async fn info_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(user) = msg
        .reply_to_message()
        .and_then(|r| r.from.as_ref())
        .or(msg.from.as_ref())
    else {
        return Ok(());
    };

    let none = state.text("info.none");
    let yes_no = |flag: bool| state.text(if flag { "info.yes" } else { "info.no" });
    let username = user
        .username
        .as_ref()
        .map(|u| format!("@{}", u))
        .unwrap_or_else(|| none.clone());

    let text = state
        .text("info.text")
        .replace("{first}", &html_escape(&user.first_name))
        .replace(
            "{last}",
            &user.last_name.as_deref().map(html_escape).unwrap_or_else(|| none.clone()),
        )
        .replace("{username}", &html_escape(&username))
        .replace("{id}", &user.id.to_string())
        .replace("{bot}", &yes_no(user.is_bot))
        .replace("{premium}", &yes_no(user.is_premium));

    reply_html(&bot, &msg, text).await?;
    Ok(())
}

/// Handle /connect - a button that continues in private chat.
pub async fn connect_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let title = msg.chat.title().unwrap_or("Grup");
    let text = state.text("connect.text").replace("{chat}", &html_escape(title));

    let mut request = bot
        .send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id));
    if let Some(url) = connect_url(&state.bot_username, msg.chat.id) {
        request = request.reply_markup(InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::url(state.text("connect.button"), url),
        ]]));
    }
    request.await?;

    Ok(())
}

/// `/start connect_<chat>` in private: confirm the sender still administers the chat.
async fn connect_landing(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    args: &str,
) -> anyhow::Result<()> {
    let (Some(chat_id), Some(user)) = (connect_payload(args), msg.from.as_ref()) else {
        reply_html(bot, msg, state.text("connect.invalid")).await?;
        return Ok(());
    };

    let chat = match bot.get_chat(chat_id).await {
        Ok(chat) => chat,
        Err(e) => {
            debug!("Connect to {} failed: {}", chat_id, e);
            reply_html(bot, msg, state.text("connect.invalid")).await?;
            return Ok(());
        }
    };

    let text = if state.permissions.is_admin(chat_id, user.id).await {
        state
            .text("connect.connected")
            .replace("{chat}", &html_escape(chat.title().unwrap_or("Grup")))
    } else {
        state.text("connect.not_admin")
    };
    reply_html(bot, msg, text).await?;
    Ok(())
}

fn connect_payload(args: &str) -> Option<ChatId> {
    args.trim()
        .strip_prefix(CONNECT_PREFIX)?
        .parse::<i64>()
        .ok()
        .map(ChatId)
}

fn connect_url(bot_username: &str, chat_id: ChatId) -> Option<Url> {
    if bot_username.is_empty() {
        return None;
    }
    Url::parse(&format!(
        "https://t.me/{}?start={}{}",
        bot_username, CONNECT_PREFIX, chat_id.0
    ))
    .ok()
}

fn add_to_group_url(bot_username: &str) -> Option<Url> {
    if bot_username.is_empty() {
        return None;
    }
    Url::parse(&format!("https://t.me/{}?startgroup=true", bot_username)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_to_group_url() {
        let url = add_to_group_url("harley_bot").unwrap();
        assert_eq!(url.as_str(), "https://t.me/harley_bot?startgroup=true");
        assert!(add_to_group_url("").is_none());
    }

    #[test]
    fn test_connect_link_round_trip() {
        let url = connect_url("harley_bot", ChatId(-1001234)).unwrap();
        assert_eq!(url.as_str(), "https://t.me/harley_bot?start=connect_-1001234");

        let payload = url.query().and_then(|q| q.strip_prefix("start=")).unwrap();
        assert_eq!(connect_payload(payload), Some(ChatId(-1001234)));
    }

    #[test]
    fn test_connect_payload_rejects_garbage() {
        assert_eq!(connect_payload("connect_abc"), None);
        assert_eq!(connect_payload("connect_"), None);
        assert_eq!(connect_payload("hello"), None);
    }
}
