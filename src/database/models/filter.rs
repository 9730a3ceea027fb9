//! Filter model and trigger matching.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::common::{lenient_button_rows, InlineButton};

/// Keyword prefix for "message starts with" filters.
pub const PREFIX_MARKER: &str = "prefix:";
/// Keyword prefix for "message equals" filters.
pub const EXACT_MARKER: &str = "exact:";

/// Media attached to a filter reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Sticker,
    Animation,
    Video,
    Document,
    Audio,
    Voice,
    VideoNote,
}

impl MediaKind {
    /// Whether Telegram accepts a caption for this media kind.
    pub fn supports_caption(self) -> bool {
        !matches!(self, Self::Sticker | Self::VideoNote)
    }
}

/// Derived classification shown in /filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    Text,
    Media,
    Button,
}

/// How a stored keyword is compared against a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind<'a> {
    /// `prefix:foo` - message starts with `foo`
    Prefix(&'a str),
    /// `exact:foo` - message equals `foo`
    Exact(&'a str),
    /// `foo` - `foo` appears as a whole word
    Word(&'a str),
}

/// A single filter document (stored in `filters` collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRecord {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Chat ID this filter belongs to
    pub chat_id: i64,

    /// Lowercase keyword, including any `prefix:`/`exact:` marker
    pub keyword: String,

    /// Reply template
    #[serde(default)]
    pub response: Option<String>,

    /// Media kind (if any)
    #[serde(default)]
    pub media_type: Option<MediaKind>,

    /// Telegram file ID of the media
    #[serde(default)]
    pub media_ref: Option<String>,

    /// Caption template for media
    #[serde(default)]
    pub caption: Option<String>,

    /// Buttons for the reply
    #[serde(default, deserialize_with = "lenient_button_rows")]
    pub buttons: Vec<Vec<InlineButton>>,

    /// Derived from the fields above
    #[serde(default)]
    pub filter_type: FilterType,
}

/// Reply content of a filter, everything except its key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterContent {
    pub response: Option<String>,
    pub media: Option<(MediaKind, String)>,
    pub caption: Option<String>,
    pub buttons: Vec<Vec<InlineButton>>,
}

impl FilterContent {
    /// Text-only content.
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            ..Default::default()
        }
    }

    /// Whether there is anything to send.
    pub fn is_empty(&self) -> bool {
        self.media.is_none()
            && self.response.as_deref().is_none_or(|r| r.trim().is_empty())
            && self.caption.as_deref().is_none_or(|c| c.trim().is_empty())
    }
}

/// Normalize a keyword for storage and lookup.
pub fn normalize_keyword(keyword: &str) -> String {
    fold_case(keyword)
}

/// Lowercase, dropping the combining dot `İ` lowercases into.
fn fold_case(text: &str) -> String {
    text.to_lowercase().replace('\u{307}', "")
}

impl FilterRecord {
    /// Build a record, normalizing the keyword and deriving the type.
    pub fn new(chat_id: i64, keyword: &str, content: FilterContent) -> Self {
        let filter_type = if content.media.is_some() {
            FilterType::Media
        } else if !content.buttons.is_empty() {
            FilterType::Button
        } else {
            FilterType::Text
        };
        let (media_type, media_ref) = match content.media {
            Some((kind, file_id)) => (Some(kind), Some(file_id)),
            None => (None, None),
        };

        Self {
            id: None,
            chat_id,
            keyword: normalize_keyword(keyword),
            response: content.response,
            media_type,
            media_ref,
            caption: content.caption,
            buttons: content.buttons,
            filter_type,
        }
    }

    /// The media to send, when both kind and file ID are present.
    pub fn media(&self) -> Option<(MediaKind, &str)> {
        match (self.media_type, self.media_ref.as_deref()) {
            (Some(kind), Some(file_id)) => Some((kind, file_id)),
            _ => None,
        }
    }

    /// Split the keyword into its match kind.
    pub fn match_kind(&self) -> MatchKind<'_> {
        if let Some(rest) = self.keyword.strip_prefix(PREFIX_MARKER) {
            MatchKind::Prefix(rest)
        } else if let Some(rest) = self.keyword.strip_prefix(EXACT_MARKER) {
            MatchKind::Exact(rest)
        } else {
            MatchKind::Word(&self.keyword)
        }
    }

    /// Check if a message matches this filter's trigger (case-insensitive).
    pub fn matches(&self, message: &str) -> bool {
        let msg_lower = fold_case(message);

        match self.match_kind() {
            MatchKind::Prefix(p) => !p.is_empty() && msg_lower.starts_with(&fold_case(p)),
            MatchKind::Exact(e) => !e.is_empty() && msg_lower.trim() == fold_case(e),
            MatchKind::Word(w) => !w.is_empty() && contains_word(&msg_lower, &fold_case(w)),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `word` occurs in `text` and is not glued to other word characters.
///
/// Both sides must already be case-folded.
fn contains_word(text: &str, word: &str) -> bool {
    text.match_indices(word).any(|(start, found)| {
        let before = text[..start].chars().next_back();
        let after = text[start + found.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

/// First filter that matches, in the given order. Later matches never fire.
pub fn find_match<'a>(filters: &'a [FilterRecord], message: &str) -> Option<&'a FilterRecord> {
    filters.iter().find(|f| f.matches(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(keyword: &str, reply: &str) -> FilterRecord {
        FilterRecord::new(-100, keyword, FilterContent::text(reply))
    }

    #[test]
    fn test_word_boundary() {
        let cat = filter("cat", "meow");
        assert!(!cat.matches("category"));
        assert!(cat.matches("the cat sat"));
        assert!(cat.matches("CAT!"));
        assert!(!cat.matches("concat"));
    }

    #[test]
    fn test_unicode_word() {
        let f = filter("merhaba", "Hoş geldin!");
        assert!(f.matches("herkes merhaba diyor"));
        assert!(f.matches("Merhaba"));
        assert!(!f.matches("merhabalar"));
    }

    #[test]
    fn test_dotted_capital_i_word() {
        let f = filter("İstanbul", "x");
        assert!(f.matches("İstanbul güzel"));
        assert!(f.matches("istanbul güzel"));
        assert!(f.matches("ne güzel ISTANBUL"));
        assert!(!f.matches("İstanbullu"));
        assert!(filter("prefix:İst", "x").matches("istanbul"));
    }

    #[test]
    fn test_word_next_to_punctuation_and_underscore() {
        let f = filter("kural", "x");
        assert!(f.matches("(kural)"));
        assert!(f.matches("kural, kural"));
        assert!(!f.matches("kural_1"));
        assert!(filter("c++", "x").matches("c++ öğren"));
    }

    #[test]
    fn test_prefix_and_exact() {
        let prefix = filter("prefix:/cmd", "x");
        assert!(prefix.matches("/cmd extra text"));
        assert!(!prefix.matches("not /cmd"));

        let exact = filter("exact:yo", "x");
        assert!(exact.matches("yo"));
        assert!(exact.matches("YO"));
        assert!(!exact.matches("yo!"));
    }

    #[test]
    fn test_empty_marker_never_matches() {
        assert!(!filter("prefix:", "x").matches("anything"));
        assert!(!filter("exact:", "x").matches(""));
    }

    #[test]
    fn test_first_registered_wins() {
        let exact_first = vec![filter("exact:hi", "A"), filter("hi", "B")];
        let found = find_match(&exact_first, "hi").and_then(|f| f.response.clone());
        assert_eq!(found.as_deref(), Some("A"));

        let plain_first = vec![filter("hi", "B"), filter("exact:hi", "A")];
        let found = find_match(&plain_first, "hi").and_then(|f| f.response.clone());
        assert_eq!(found.as_deref(), Some("B"));
    }

    #[test]
    fn test_keyword_is_lowercased_and_type_derived() {
        let f = FilterRecord::new(
            1,
            "HeLLo",
            FilterContent {
                buttons: vec![vec![InlineButton::new("a", "https://a")]],
                ..FilterContent::text("x")
            },
        );
        assert_eq!(f.keyword, "hello");
        assert_eq!(f.filter_type, FilterType::Button);

        let media = FilterRecord::new(
            1,
            "pic",
            FilterContent {
                media: Some((MediaKind::Photo, "file".into())),
                ..Default::default()
            },
        );
        assert_eq!(media.filter_type, FilterType::Media);
        assert_eq!(media.media(), Some((MediaKind::Photo, "file")));
    }

    #[test]
    fn test_malformed_buttons_deserialize_as_empty() {
        let json = r#"{"chat_id": 1, "keyword": "k", "response": "r", "buttons": "not json rows"}"#;
        let f: FilterRecord = serde_json::from_str(json).expect("record parses");
        assert!(f.buttons.is_empty());
        assert_eq!(f.filter_type, FilterType::Text);
    }
}
