//! Filter management commands.
//!
//! /filter, /filters, /stop, /stopall

use teloxide::prelude::*;
use tracing::{error, info};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{FilterContent, FilterRecord, FilterType, MediaKind};
use crate::utils::{html_escape, parse_buttons, parse_filter_definition};

use super::{reply_html, require, Privilege};

/// Handle /filter <keywords> [response].
///
/// As a reply, media, caption and text are taken from the replied message.
pub async fn filter_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let chat_id = msg.chat.id.0;
    let definition = parse_filter_definition(&args);

    if definition.keywords.is_empty() {
        reply_html(&bot, &msg, state.text("filters.usage")).await?;
        return Ok(());
    }

    let content = filter_content(&definition.body, msg.reply_to_message());
    if content.is_empty() {
        reply_html(&bot, &msg, state.text("filters.missing_response")).await?;
        return Ok(());
    }

    let media = content.media.as_ref().map(|(kind, _)| *kind);
    for keyword in &definition.keywords {
        let record = FilterRecord::new(chat_id, keyword, content.clone());
        if let Err(e) = state.storage.filters.add_or_replace(record).await {
            error!("Failed to save filter '{}' in {}: {}", keyword, chat_id, e);
            reply_html(&bot, &msg, state.text("common.storage_error")).await?;
            return Ok(());
        }
    }
    info!("Saved {} filter(s) in chat {}", definition.keywords.len(), chat_id);

    let reply = match definition.keywords.as_slice() {
        [keyword] => {
            let media_note = media
                .map(|kind| format!(" ({})", media_label(kind)))
                .unwrap_or_default();
            state
                .text("filters.added")
                .replace("{keyword}", &html_escape(keyword))
                .replace("{media}", &media_note)
        }
        keywords => state
            .text("filters.added_many")
            .replace("{count}", &keywords.len().to_string())
            .replace(
                "{keywords}",
                &keywords
                    .iter()
                    .map(|k| format!("<code>{}</code>", html_escape(k)))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
    };
    reply_html(&bot, &msg, reply).await?;

    Ok(())
}

/// Handle /filters - list filters ordered by keyword.
pub async fn filters_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let filters = match state.storage.filters.list_all(msg.chat.id.0).await {
        Ok(filters) => filters,
        Err(e) => {
            error!("Failed to list filters in {}: {}", msg.chat.id, e);
            reply_html(&bot, &msg, state.text("common.storage_error")).await?;
            return Ok(());
        }
    };

    if filters.is_empty() {
        reply_html(&bot, &msg, state.text("filters.none")).await?;
        return Ok(());
    }

    let mut text = state.text("filters.list_header");
    text.push_str("\n\n");
    for filter in &filters {
        text.push_str(&format!(
            "- <code>{}</code> {}\n",
            html_escape(&filter.keyword),
            type_tag(filter)
        ));
    }
    text.push('\n');
    text.push_str(
        &state
            .text("filters.list_total")
            .replace("{count}", &filters.len().to_string()),
    );

    reply_html(&bot, &msg, text).await?;
    Ok(())
}

/// Handle /stop <keyword> or /stop "multi word".
pub async fn stop_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let Some(keyword) = stop_keyword(&args) else {
        reply_html(&bot, &msg, state.text("filters.stop_usage")).await?;
        return Ok(());
    };

    let key = match state.storage.filters.delete(msg.chat.id.0, &keyword).await {
        Ok(true) => "filters.stopped",
        Ok(false) => "filters.not_found",
        Err(e) => {
            error!("Failed to delete filter '{}' in {}: {}", keyword, msg.chat.id, e);
            "common.storage_error"
        }
    };
    reply_html(
        &bot,
        &msg,
        state.text(key).replace("{keyword}", &html_escape(&keyword)),
    )
    .await?;

    Ok(())
}

/// Handle /stopall - delete every filter of the chat.
pub async fn stopall_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require(&bot, &msg, &state, Privilege::Admin).await? {
        return Ok(());
    }

    let text = match state.storage.filters.delete_all(msg.chat.id.0).await {
        Ok(count) => {
            info!("Deleted {} filters in chat {}", count, msg.chat.id);
            state
                .text("filters.stopped_all")
                .replace("{count}", &count.to_string())
        }
        Err(e) => {
            error!("Failed to delete filters in {}: {}", msg.chat.id, e);
            state.text("common.storage_error")
        }
    };
    reply_html(&bot, &msg, text).await?;

    Ok(())
}

/// Build filter content from the response body and the replied message.
///
/// The body wins over the replied text. Buttons are read from the response
/// text, or from the caption when the text has none; the text itself is
/// stored as written.
fn filter_content(body: &str, reply: Option<&Message>) -> FilterContent {
    let mut content = FilterContent::default();

    if !body.trim().is_empty() {
        content.response = Some(body.to_string());
    }

    if let Some(reply) = reply {
        content.media = media_of(reply);
        content.caption = reply.caption().map(str::to_string);
        if content.response.is_none() {
            content.response = reply.text().map(str::to_string);
        }
    }

    content.buttons = [content.response.as_deref(), content.caption.as_deref()]
        .into_iter()
        .flatten()
        .map(|text| parse_buttons(text).1)
        .find(|rows| !rows.is_empty())
        .unwrap_or_default();

    content
}

/// Media attached to a message, with its file ID.
pub fn media_of(msg: &Message) -> Option<(MediaKind, String)> {
    if let Some(sticker) = msg.sticker() {
        return Some((MediaKind::Sticker, sticker.file.id.clone()));
    }
    if let Some(photo) = msg.photo() {
        let largest = photo.iter().max_by_key(|p| p.width * p.height)?;
        return Some((MediaKind::Photo, largest.file.id.clone()));
    }
    if let Some(animation) = msg.animation() {
        return Some((MediaKind::Animation, animation.file.id.clone()));
    }
    if let Some(video) = msg.video() {
        return Some((MediaKind::Video, video.file.id.clone()));
    }
    if let Some(document) = msg.document() {
        return Some((MediaKind::Document, document.file.id.clone()));
    }
    if let Some(audio) = msg.audio() {
        return Some((MediaKind::Audio, audio.file.id.clone()));
    }
    if let Some(voice) = msg.voice() {
        return Some((MediaKind::Voice, voice.file.id.clone()));
    }
    if let Some(note) = msg.video_note() {
        return Some((MediaKind::VideoNote, note.file.id.clone()));
    }
    None
}

fn media_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "photo",
        MediaKind::Sticker => "sticker",
        MediaKind::Animation => "animation",
        MediaKind::Video => "video",
        MediaKind::Document => "document",
        MediaKind::Audio => "audio",
        MediaKind::Voice => "voice",
        MediaKind::VideoNote => "video_note",
    }
}

/// Type marker shown in /filters.
fn type_tag(filter: &FilterRecord) -> &'static str {
    match filter.media_type {
        Some(MediaKind::Photo) => "[foto]",
        Some(MediaKind::Sticker) => "[sticker]",
        Some(MediaKind::Video) => "[video]",
        Some(MediaKind::Animation) => "[gif]",
        Some(MediaKind::Document) => "[dosya]",
        Some(_) => "[medya]",
        None if filter.filter_type == FilterType::Button => "[buton]",
        None => "[metin]",
    }
}

/// Keyword argument of /stop: a quoted phrase, or the whole argument.
fn stop_keyword(args: &str) -> Option<String> {
    let args = args.trim();
    let keyword = match args.strip_prefix('"').and_then(|rest| rest.split_once('"')) {
        Some((quoted, _)) => quoted,
        None => args,
    };
    (!keyword.trim().is_empty()).then(|| keyword.to_string())
}
