//! Filter event handler.
//!
//! Matches incoming group messages against the chat's filters and sends the
//! rendered response of the first match.

use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode, ReplyParameters};
use tracing::debug;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{find_match, FilterRecord, FilterStore, MediaKind};
use crate::utils::{build_keyboard, render_filter_response, FillingContext, Rendered, Sender};

/// First filter of the chat matching `text`, in insertion order.
pub async fn match_filter(
    store: &dyn FilterStore,
    chat_id: i64,
    text: &str,
) -> anyhow::Result<Option<FilterRecord>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let filters = store.list_for_matching(chat_id).await?;
    Ok(find_match(&filters, text).cloned())
}

/// Check a message against the chat's filters - called from the unified handler.
pub async fn check_filters(bot: &ThrottledBot, msg: &Message, state: &AppState) -> anyhow::Result<()> {
    let Some(text) = msg.text().or_else(|| msg.caption()) else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    let Some(filter) = match_filter(state.storage.filters.as_ref(), chat_id.0, text).await? else {
        return Ok(());
    };
    debug!("Filter '{}' matched in chat {}", filter.keyword, chat_id);

    let ctx = FillingContext {
        sender: msg.from.as_ref().map(Sender::from).unwrap_or_default(),
        chat_title: msg.chat.title().map(str::to_string),
    };
    let rendered = render_filter_response(&filter, &ctx);

    send_response(bot, chat_id, Some(msg.id), &rendered, filter.media()).await
}

/// Send a rendered response, as media when a file is attached.
///
/// Stickers and video notes take no caption; their text is dropped.
pub async fn send_response(
    bot: &ThrottledBot,
    chat_id: ChatId,
    reply_to: Option<MessageId>,
    rendered: &Rendered,
    media: Option<(MediaKind, &str)>,
) -> anyhow::Result<()> {
    let keyboard = build_keyboard(&rendered.buttons);
    let reply = reply_to.map(ReplyParameters::new);

    // Shared optional parts of every send request
    macro_rules! finish {
        ($req:expr) => {{
            let mut req = $req;
            if let Some(reply) = reply.clone() {
                req = req.reply_parameters(reply);
            }
            if let Some(keyboard) = keyboard.clone() {
                req = req.reply_markup(keyboard);
            }
            req.await?;
        }};
    }
    macro_rules! captioned {
        ($req:expr) => {{
            let mut req = $req;
            if let Some(caption) = rendered.caption.as_deref() {
                req = req.caption(caption).parse_mode(ParseMode::Html);
            }
            finish!(req)
        }};
    }

    match media {
        Some((kind, file_id)) => {
            let file = InputFile::file_id(file_id.to_string());
            match kind {
                MediaKind::Photo => captioned!(bot.send_photo(chat_id, file)),
                MediaKind::Animation => captioned!(bot.send_animation(chat_id, file)),
                MediaKind::Video => captioned!(bot.send_video(chat_id, file)),
                MediaKind::Document => captioned!(bot.send_document(chat_id, file)),
                MediaKind::Audio => captioned!(bot.send_audio(chat_id, file)),
                MediaKind::Voice => captioned!(bot.send_voice(chat_id, file)),
                MediaKind::Sticker => finish!(bot.send_sticker(chat_id, file)),
                MediaKind::VideoNote => finish!(bot.send_video_note(chat_id, file)),
            }
        }
        None if rendered.text.trim().is_empty() => {
            debug!("Nothing to send in chat {}", chat_id);
        }
        None => finish!(bot
            .send_message(chat_id, rendered.text.clone())
            .parse_mode(ParseMode::Html)),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{FilterContent, MemoryStore};

    async fn store_with(filters: &[(&str, &str)]) -> MemoryStore {
        let store = MemoryStore::new();
        for (keyword, response) in filters {
            store
                .add_or_replace(FilterRecord::new(-100, keyword, FilterContent::text(*response)))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_word_filter_matches_inside_sentence() {
        let store = store_with(&[("merhaba", "Hoş geldin!")]).await;
        let matched = match_filter(&store, -100, "herkes merhaba diyor").await.unwrap();
        assert_eq!(
            matched.and_then(|f| f.response),
            Some("Hoş geldin!".to_string())
        );
    }

    #[tokio::test]
    async fn test_first_inserted_filter_wins() {
        let store = store_with(&[("zeta", "first"), ("alfa", "second")]).await;
        let matched = match_filter(&store, -100, "alfa zeta").await.unwrap().unwrap();
        assert_eq!(matched.keyword, "zeta");
    }

    #[tokio::test]
    async fn test_replace_keeps_match_position() {
        let store = store_with(&[("a", "1"), ("b", "2")]).await;
        store
            .add_or_replace(FilterRecord::new(-100, "a", FilterContent::text("3")))
            .await
            .unwrap();
        let matched = match_filter(&store, -100, "b a").await.unwrap().unwrap();
        assert_eq!(matched.response.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_no_match_and_other_chats() {
        let store = store_with(&[("merhaba", "x")]).await;
        assert!(match_filter(&store, -100, "merhabalar").await.unwrap().is_none());
        assert!(match_filter(&store, -200, "merhaba").await.unwrap().is_none());
        assert!(match_filter(&store, -100, "   ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prefix_and_exact_filters() {
        let store = store_with(&[("prefix:!kural", "kurallar"), ("exact:selam", "aleyküm")]).await;
        assert!(match_filter(&store, -100, "!kurallar lütfen").await.unwrap().is_some());
        assert!(match_filter(&store, -100, "Selam").await.unwrap().is_some());
        assert!(match_filter(&store, -100, "selam millet").await.unwrap().is_none());
    }
}
