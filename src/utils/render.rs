//! Response rendering for filters and welcome messages.
//!
//! Rendering runs three steps in a fixed order: pick one `%%%` variant,
//! substitute fillings, then parse buttons out of the result.

use std::sync::LazyLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Captures, Regex};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, User};
use url::Url;

use crate::database::{FilterRecord, InlineButton};

use super::parser::{html_escape, parse_buttons, parse_random_parts, RANDOM_SEPARATOR};

/// Shown when a user has no name at all.
pub const FALLBACK_USER_NAME: &str = "Kullanıcı";
/// Shown when there is no chat title.
pub const FALLBACK_CHAT_NAME: &str = "Grup";

static FILLING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("filling pattern is valid"));

/// The user a response is rendered for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub id: u64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl From<&User> for Sender {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.0,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        }
    }
}

impl Sender {
    fn full_name(&self) -> String {
        let full = match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        };
        let full = full.trim();
        if full.is_empty() {
            FALLBACK_USER_NAME.to_string()
        } else {
            full.to_string()
        }
    }
}

/// Values available to fillings.
#[derive(Debug, Clone, Default)]
pub struct FillingContext {
    pub sender: Sender,
    pub chat_title: Option<String>,
}

/// A response ready to send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Caption for media filters
    pub caption: Option<String>,
    pub buttons: Vec<Vec<InlineButton>>,
}

/// Pick one `%%%` variant uniformly. Text without a separator, or with only
/// blank variants, is returned as is.
pub fn pick_variant<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    if !text.contains(RANDOM_SEPARATOR) {
        return text.to_string();
    }
    parse_random_parts(text)
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| text.to_string())
}

/// HTML mention link for a user.
pub fn user_mention(user_id: u64, name: &str) -> String {
    let name = if name.trim().is_empty() {
        FALLBACK_USER_NAME
    } else {
        name
    };
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user_id,
        html_escape(name)
    )
}

/// Replace the known placeholders in a single pass, so inserted values are
/// never expanded again. Unknown `{...}` tokens are left alone.
///
/// Placeholders:
/// - `{first}`, `{last}`, `{fullname}` - sender names
/// - `{username}` - `@username`, or the first name without one
/// - `{mention}` - clickable mention
/// - `{id}` - numeric user ID
/// - `{chatname}` - chat title
pub fn apply_fillings(text: &str, ctx: &FillingContext) -> String {
    let sender = &ctx.sender;
    let first = if sender.first_name.trim().is_empty() {
        FALLBACK_USER_NAME.to_string()
    } else {
        sender.first_name.clone()
    };
    let chat_name = ctx
        .chat_title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(FALLBACK_CHAT_NAME);

    FILLING_RE
        .replace_all(text, |caps: &Captures| match &caps[1] {
            "first" => html_escape(&first),
            "last" => html_escape(sender.last_name.as_deref().unwrap_or("")),
            "fullname" => html_escape(&sender.full_name()),
            "username" => match sender.username.as_deref() {
                Some(u) if !u.is_empty() => format!("@{}", u),
                _ => html_escape(&first),
            },
            "mention" => user_mention(sender.id, &first),
            "id" => sender.id.to_string(),
            "chatname" => html_escape(chat_name),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Variant, fillings and buttons for one template.
pub fn render_text<R: Rng + ?Sized>(
    template: &str,
    ctx: &FillingContext,
    rng: &mut R,
) -> (String, Vec<Vec<InlineButton>>) {
    let picked = pick_variant(template, rng);
    let filled = apply_fillings(&picked, ctx);
    parse_buttons(&filled)
}

/// Render a stored filter for a sender.
pub fn render_filter_response(filter: &FilterRecord, ctx: &FillingContext) -> Rendered {
    render_filter_response_with(filter, ctx, &mut rand::thread_rng())
}

/// [`render_filter_response`] with an explicit random source.
///
/// Buttons found in the rendered text win. Without them the caption's
/// buttons are used, and the stored buttons come last.
pub fn render_filter_response_with<R: Rng + ?Sized>(
    filter: &FilterRecord,
    ctx: &FillingContext,
    rng: &mut R,
) -> Rendered {
    let (text, text_buttons) = render_text(filter.response.as_deref().unwrap_or(""), ctx, rng);

    let (caption, caption_buttons) = match (filter.media(), filter.caption.as_deref()) {
        (Some(_), Some(caption)) => {
            let (caption, buttons) = render_text(caption, ctx, rng);
            (Some(caption), buttons)
        }
        (Some(_), None) if !text.is_empty() => (Some(text.clone()), Vec::new()),
        _ => (None, Vec::new()),
    };

    let buttons = if !text_buttons.is_empty() {
        text_buttons
    } else if !caption_buttons.is_empty() {
        caption_buttons
    } else {
        filter.buttons.clone()
    };

    Rendered {
        text,
        caption: caption.filter(|c| !c.is_empty()),
        buttons,
    }
}

/// Build an inline keyboard. Buttons with unparseable URLs are dropped.
pub fn build_keyboard(rows: &[Vec<InlineButton>]) -> Option<InlineKeyboardMarkup> {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|b| {
                    Url::parse(&b.url)
                        .ok()
                        .map(|url| InlineKeyboardButton::url(b.text.clone(), url))
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    if keyboard.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::new(keyboard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{FilterContent, MediaKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn ctx() -> FillingContext {
        FillingContext {
            sender: Sender {
                id: 42,
                first_name: "Ayşe".to_string(),
                last_name: Some("Yılmaz".to_string()),
                username: Some("ayse".to_string()),
            },
            chat_title: Some("Çay Ocağı".to_string()),
        }
    }

    fn text_filter(response: &str) -> FilterRecord {
        FilterRecord::new(-100, "hi", FilterContent::text(response))
    }

    #[test]
    fn test_fillings() {
        let out = apply_fillings(
            "{first} {last} | {fullname} | {username} | {id} | {chatname} | {unknown}",
            &ctx(),
        );
        assert_eq!(
            out,
            "Ayşe Yılmaz | Ayşe Yılmaz | @ayse | 42 | Çay Ocağı | {unknown}"
        );
    }

    #[test]
    fn test_fillings_fallbacks() {
        let ctx = FillingContext {
            sender: Sender {
                id: 7,
                ..Default::default()
            },
            chat_title: None,
        };
        let out = apply_fillings("{fullname} {username} {chatname}", &ctx);
        assert_eq!(out, "Kullanıcı Kullanıcı Grup");
    }

    #[test]
    fn test_filled_values_are_not_expanded_again() {
        let mut ctx = ctx();
        ctx.sender.first_name = "{chatname}".to_string();
        ctx.sender.last_name = Some("{id}".to_string());
        assert_eq!(
            apply_fillings("Hi {first} {last} in {chatname}", &ctx),
            "Hi {chatname} {id} in Çay Ocağı"
        );
    }

    #[test]
    fn test_mention_is_escaped() {
        let mut ctx = ctx();
        ctx.sender.first_name = "<b>".to_string();
        assert_eq!(
            apply_fillings("{mention}", &ctx),
            "<a href=\"tg://user?id=42\">&lt;b&gt;</a>"
        );
    }

    #[test]
    fn test_render_is_deterministic_without_separator() {
        let filter = text_filter("Selam {first}!");
        let first = render_filter_response(&filter, &ctx());
        for _ in 0..20 {
            assert_eq!(render_filter_response(&filter, &ctx()), first);
        }
        assert_eq!(first.text, "Selam Ayşe!");
    }

    #[test]
    fn test_random_variants_cover_every_option() {
        let filter = text_filter("bir %%% iki %%%   %%% üç");
        let options: HashSet<&str> = ["bir", "iki", "üç"].into_iter().collect();
        let mut seen = HashSet::new();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1000 {
            let rendered = render_filter_response_with(&filter, &ctx(), &mut rng);
            assert!(options.contains(rendered.text.as_str()));
            seen.insert(rendered.text);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_blank_variants_fall_back_to_text() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_variant(" %%% ", &mut rng), " %%% ");
        assert_eq!(pick_variant("plain", &mut rng), "plain");
    }

    #[test]
    fn test_plain_filter_scenario() {
        let filter = text_filter("Hoş geldin!");
        let rendered = render_filter_response(&filter, &ctx());
        assert_eq!(rendered.text, "Hoş geldin!");
        assert!(rendered.buttons.is_empty());
        assert!(rendered.caption.is_none());
    }

    #[test]
    fn test_text_buttons_win_over_stored() {
        let mut content = FilterContent::text("Kurallar [Oku](https://a.example)");
        content.buttons = vec![vec![InlineButton::new("Eski", "https://old.example")]];
        let filter = FilterRecord::new(-100, "kurallar", content);

        let rendered = render_filter_response(&filter, &ctx());
        assert_eq!(rendered.text, "Kurallar");
        assert_eq!(
            rendered.buttons,
            vec![vec![InlineButton::new("Oku", "https://a.example")]]
        );
    }

    #[test]
    fn test_stored_buttons_used_when_text_has_none() {
        let mut content = FilterContent::text("Kurallar");
        content.buttons = vec![vec![InlineButton::new("Eski", "https://old.example")]];
        let filter = FilterRecord::new(-100, "kurallar", content);

        let rendered = render_filter_response(&filter, &ctx());
        assert_eq!(rendered.buttons, filter.buttons);
    }

    #[test]
    fn test_media_caption_rendered_separately() {
        let content = FilterContent {
            response: Some("metin".to_string()),
            media: Some((MediaKind::Photo, "file-1".to_string())),
            caption: Some("{first} [Site](https://s.example)".to_string()),
            buttons: Vec::new(),
        };
        let filter = FilterRecord::new(-100, "foto", content);

        let rendered = render_filter_response(&filter, &ctx());
        assert_eq!(rendered.text, "metin");
        assert_eq!(rendered.caption.as_deref(), Some("Ayşe"));
        assert_eq!(
            rendered.buttons,
            vec![vec![InlineButton::new("Site", "https://s.example")]]
        );
    }

    #[test]
    fn test_build_keyboard_skips_bad_urls() {
        let rows = vec![
            vec![InlineButton::new("A", "https://a.example")],
            vec![InlineButton::new("B", "not a url")],
        ];
        let keyboard = build_keyboard(&rows).unwrap();
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert!(build_keyboard(&[]).is_none());
    }
}
