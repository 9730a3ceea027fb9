//! Centralized text parser.
//!
//! This module parses the text-level grammars shared by commands:
//! - Filter keywords: `word`, `"multi word"`, `(a, "b, c", d)`
//! - Buttons: `[Label](https://url)`, `[Label](buttonurl:url)`, `:same` keeps the row
//! - Durations: `30s`, `10m`, `1h`, `2d`, `1w`
//! - On/off toggles in Turkish and English

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::database::InlineButton;

/// Separator between random response variants.
pub const RANDOM_SEPARATOR: &str = "%%%";

/// `[label](target)` with an optional `buttonurl:` prefix and `:same` marker.
static BUTTON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\[\]\n]+)\]\(\s*(buttonurl:\s*)?([^()\s]+?)(:same)?\s*\)(:same)?")
        .expect("button pattern is valid")
});

/// URL schemes accepted for inline buttons.
const BUTTON_SCHEMES: [&str; 3] = ["http://", "https://", "tg://"];

/// Keywords and response body parsed from a filter definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterDefinition {
    /// Keywords in the order they were written
    pub keywords: Vec<String>,
    /// Everything after the keyword list, leading whitespace removed
    pub body: String,
}

/// Parse the arguments of a filter-definition command.
///
/// Grammar, first rule that applies wins:
/// 1. `(k1, "k two", k3)` - comma separated group, quoted segments kept verbatim
/// 2. `"k two"` - a single quoted phrase
/// 3. the first whitespace-delimited token
pub fn parse_filter_definition(args: &str) -> FilterDefinition {
    FilterDefinition {
        keywords: parse_filter_keywords(args),
        body: extract_response_body(args),
    }
}

/// Keywords of a filter definition. An empty result is a usage error.
pub fn parse_filter_keywords(args: &str) -> Vec<String> {
    split_filter_spec(args).0
}

/// The response body that follows the keyword list.
///
/// Only the keyword syntax is consumed; inline button syntax stays in place.
pub fn extract_response_body(args: &str) -> String {
    split_filter_spec(args).1.trim_start().to_string()
}

fn split_filter_spec(args: &str) -> (Vec<String>, &str) {
    let args = args.trim_start();
    if args.is_empty() {
        return (Vec::new(), "");
    }

    if args.starts_with('(') {
        if let Some(end) = closing_paren(args) {
            let inner = &args[1..end];
            if !looks_like_link(inner) {
                return (split_keyword_group(inner), &args[end + 1..]);
            }
        }
    }

    if let Some(quoted) = args.strip_prefix('"') {
        if let Some(end) = quoted.find('"') {
            let phrase = &quoted[..end];
            let keywords = if phrase.trim().is_empty() {
                Vec::new()
            } else {
                vec![phrase.to_string()]
            };
            return (keywords, &quoted[end + 1..]);
        }
    }

    let end = args.find(char::is_whitespace).unwrap_or(args.len());
    (vec![args[..end].to_string()], &args[end..])
}

/// Byte index of the `)` closing a leading `(`, ignoring quoted text.
fn closing_paren(text: &str) -> Option<usize> {
    let mut in_quote = false;
    for (idx, c) in text.char_indices().skip(1) {
        match c {
            '"' => in_quote = !in_quote,
            ')' if !in_quote => return Some(idx),
            _ => {}
        }
    }
    None
}

fn looks_like_link(inner: &str) -> bool {
    let lower = inner.trim_start().to_lowercase();
    lower.starts_with("buttonurl:") || BUTTON_SCHEMES.iter().any(|s| lower.starts_with(s))
}

fn split_keyword_group(inner: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    for c in inner.chars() {
        match c {
            '"' => {
                in_quote = !in_quote;
                current.push(c);
            }
            ',' if !in_quote => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);

    segments
        .iter()
        .filter_map(|segment| {
            let trimmed = segment.trim();
            let keyword = trimmed
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(trimmed);
            (!keyword.trim().is_empty()).then(|| keyword.to_string())
        })
        .collect()
}

/// Parse inline buttons out of text.
///
/// Syntax:
/// - `[Text](https://url)` - button on a new row
/// - `[Text](https://url:same)` or `[Text](https://url):same` - same row as the previous button
/// - `[Text](buttonurl:example.com)` - legacy form, scheme defaults to `https://`
///
/// Returns (text without buttons, parsed buttons as rows). Text without any
/// recognized button is returned unchanged.
pub fn parse_buttons(input: &str) -> (String, Vec<Vec<InlineButton>>) {
    let mut text = input.to_string();
    let mut rows: Vec<Vec<InlineButton>> = Vec::new();
    let mut found = false;

    // Removing a token can expose an outer one, so strip until nothing matches.
    loop {
        let (stripped, extracted) = extract_buttons_once(&text);
        if extracted.is_empty() {
            break;
        }
        found = true;
        text = stripped;
        for (button, same_row) in extracted {
            match rows.last_mut() {
                Some(row) if same_row => row.push(button),
                _ => rows.push(vec![button]),
            }
        }
    }

    if !found {
        return (text, rows);
    }
    (squeeze_blank_lines(&text), rows)
}

fn extract_buttons_once(text: &str) -> (String, Vec<(InlineButton, bool)>) {
    let mut stripped = String::with_capacity(text.len());
    let mut buttons = Vec::new();
    let mut last = 0;

    for caps in BUTTON_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let label = caps.get(1).map_or("", |m| m.as_str()).trim();
        let legacy = caps.get(2).is_some();
        let target = caps.get(3).map_or("", |m| m.as_str());
        let same_row = caps.get(4).is_some() || caps.get(5).is_some();

        let Some(url) = button_url(target, legacy) else { continue };
        if label.is_empty() {
            continue;
        }

        stripped.push_str(&text[last..whole.start()]);
        last = whole.end();
        buttons.push((InlineButton::new(label, url), same_row));
    }
    stripped.push_str(&text[last..]);

    (stripped, buttons)
}

/// Normalize a button target, or `None` when it is not a button link.
fn button_url(target: &str, legacy: bool) -> Option<String> {
    let lower = target.to_lowercase();
    if BUTTON_SCHEMES.iter().any(|s| lower.starts_with(s)) {
        return Some(target.to_string());
    }
    if lower.contains("://") {
        return None;
    }
    if legacy || lower.starts_with("www.") {
        return Some(format!("https://{}", target));
    }
    None
}

/// Trim line ends, collapse runs of blank lines to one and trim the whole text.
fn squeeze_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim_end) {
        if line.is_empty() && lines.last().is_some_and(|prev| prev.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

/// Split random content on `%%%`, dropping blank variants.
pub fn parse_random_parts(input: &str) -> Vec<String> {
    input
        .split(RANDOM_SEPARATOR)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Why a duration token was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("duration is empty")]
    Empty,
    #[error("duration `{0}` has no time unit (s, m, h, d, w)")]
    MissingUnit(String),
    #[error("unknown time unit `{0}`")]
    UnknownUnit(char),
    #[error("invalid amount in `{0}`")]
    InvalidAmount(String),
    #[error("`{0}` is out of range, use 1m to 365d")]
    OutOfRange(String),
}

/// Parse duration string (e.g., "45s", "30m", "1h", "1d", "2w").
///
/// Supported units:
/// - s: seconds
/// - m: minutes
/// - h: hours
/// - d: days
/// - w: weeks
///
/// A bare number is rejected; there is no default unit.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let input = input.trim().to_lowercase();
    let unit = input.chars().last().ok_or(DurationError::Empty)?;

    let multiplier: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86_400,
        'w' => 604_800,
        c if c.is_ascii_digit() => return Err(DurationError::MissingUnit(input)),
        c => return Err(DurationError::UnknownUnit(c)),
    };

    let digits = &input[..input.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(DurationError::InvalidAmount(input));
    }

    let seconds = digits
        .parse::<u64>()
        .ok()
        .filter(|amount| *amount > 0)
        .and_then(|amount| amount.checked_mul(multiplier))
        .ok_or_else(|| DurationError::InvalidAmount(input.clone()))?;

    Ok(Duration::from_secs(seconds))
}

/// Parse an on/off argument. Accepts Turkish and English words.
pub fn parse_toggle(arg: &str) -> Option<bool> {
    match arg.trim().to_lowercase().as_str() {
        "on" | "acik" | "açık" | "açik" | "aktif" | "true" | "1" | "evet" | "yes" => Some(true),
        "off" | "kapali" | "kapalı" | "deaktif" | "false" | "0" | "hayir" | "hayır" | "no" => {
            Some(false)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_keyword_round_trip() {
        for keyword in ["hello", "prefix:/cmd", "exact:yo", "çay", "a)b"] {
            let args = format!("{} body", keyword);
            assert_eq!(parse_filter_keywords(&args), vec![keyword.to_string()]);
            assert_eq!(extract_response_body(&args), "body");
        }
    }

    #[test]
    fn test_quoted_keyword() {
        let args = "  \"hi there\" body";
        assert_eq!(parse_filter_keywords(args), vec!["hi there".to_string()]);
        assert_eq!(extract_response_body(args), "body");
    }

    #[test]
    fn test_keyword_group() {
        let def = parse_filter_definition("(a, \"b, c\", d ) reply [X](https://x)");
        assert_eq!(def.keywords, vec!["a", "b, c", "d"]);
        assert_eq!(def.body, "reply [X](https://x)");
    }

    #[test]
    fn test_group_that_looks_like_link_is_a_token() {
        let def = parse_filter_definition("(https://x.com) reply");
        assert_eq!(def.keywords, vec!["(https://x.com)"]);
        assert_eq!(def.body, "reply");
    }

    #[test]
    fn test_empty_body_has_no_keywords() {
        assert!(parse_filter_keywords("").is_empty());
        assert!(parse_filter_keywords("   ").is_empty());
        assert!(parse_filter_keywords("\"\" reply").is_empty());
    }

    #[test]
    fn test_parse_buttons_same_row() {
        let (text, rows) = parse_buttons("[A](https://a)[B](https://b:same)");
        assert_eq!(text, "");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].text, "A");
        assert_eq!(rows[0][0].url, "https://a");
        assert_eq!(rows[0][1].text, "B");
        assert_eq!(rows[0][1].url, "https://b");
    }

    #[test]
    fn test_parse_buttons_rows_and_cleanup() {
        let input = "Hello\n\n[Site](https://example.com)\n\n\n[Chat](tg://resolve?domain=x)\n[Go](buttonurl:go.dev):same\nBye";
        let (text, rows) = parse_buttons(input);
        assert_eq!(text, "Hello\n\nBye");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].len(), 2);
        assert_eq!(rows[1][1].url, "https://go.dev");
    }

    #[test]
    fn test_same_on_first_button_starts_row() {
        let (_, rows) = parse_buttons("[A](https://a:same)");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 1);
    }

    #[test]
    fn test_link_without_scheme_is_left_alone() {
        let input = "see [docs](docs/page) now";
        let (text, rows) = parse_buttons(input);
        assert!(rows.is_empty());
        assert_eq!(text, input);
    }

    #[test]
    fn test_parse_buttons_is_idempotent() {
        let inputs = [
            "Hi [A](https://a) there\n\n\n[B](https://b:same)",
            "[x[A](https://a)](https://b)",
            "plain text",
        ];
        for input in inputs {
            let (once, _) = parse_buttons(input);
            let (twice, rows) = parse_buttons(&once);
            assert!(rows.is_empty(), "second pass found buttons in {:?}", once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_random_parts() {
        let input = "Part one\n%%%\nPart two\n%%%\n  \n%%%Part three";
        let parts = parse_random_parts(input);
        assert_eq!(parts, vec!["Part one", "Part two", "Part three"]);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("45s"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration("30m"), Ok(Duration::from_secs(1800)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1D"), Ok(Duration::from_secs(86400)));
        assert_eq!(parse_duration("1w"), Ok(Duration::from_secs(604800)));
    }

    #[test]
    fn test_parse_duration_rejects_missing_unit() {
        assert_eq!(parse_duration("10"), Err(DurationError::MissingUnit("10".into())));
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert_eq!(parse_duration("5y"), Err(DurationError::UnknownUnit('y')));
        assert!(matches!(parse_duration("h"), Err(DurationError::InvalidAmount(_))));
        assert!(matches!(parse_duration("0m"), Err(DurationError::InvalidAmount(_))));
    }

    #[test]
    fn test_parse_toggle() {
        assert_eq!(parse_toggle("AÇIK"), Some(true));
        assert_eq!(parse_toggle("on"), Some(true));
        assert_eq!(parse_toggle("kapali"), Some(false));
        assert_eq!(parse_toggle("0"), Some(false));
        assert_eq!(parse_toggle("maybe"), None);
    }
}
