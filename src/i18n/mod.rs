//! Internationalization (i18n) module.
//!
//! Reply texts live in embedded JSON catalogues, one per language.
//! Turkish is the bot's default language, English is the fallback.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;
use tracing::warn;

/// Global translation store: LangCode -> Key -> Text
static TRANSLATIONS: OnceLock<HashMap<&'static str, Value>> = OnceLock::new();

/// Language used when a key is missing from the requested one.
const FALLBACK_LANG: &str = "en";

fn catalogues() -> &'static HashMap<&'static str, Value> {
    TRANSLATIONS.get_or_init(|| {
        let mut map = HashMap::new();
        for (lang, json) in [
            ("tr", include_str!("tr.json")),
            ("en", include_str!("en.json")),
        ] {
            match serde_json::from_str(json) {
                Ok(val) => {
                    map.insert(lang, val);
                }
                Err(e) => warn!("Failed to load {} translations: {}", lang, e),
            }
        }
        map
    })
}

/// Load translations eagerly.
pub fn init() {
    catalogues();
}

/// Whether a language has a catalogue.
pub fn is_supported(lang: &str) -> bool {
    catalogues().contains_key(lang)
}

/// Get text for a key in a specific language.
/// Supports nested keys via dot notation, e.g., "filters.added".
pub fn get_text(lang: &str, key: &str) -> String {
    let store = catalogues();

    if let Some(text) = store.get(lang).and_then(|val| resolve_key(val, key)) {
        return text;
    }

    if lang != FALLBACK_LANG {
        if let Some(text) = store.get(FALLBACK_LANG).and_then(|val| resolve_key(val, key)) {
            return text;
        }
    }

    // Key not found
    key.to_string()
}

fn resolve_key(val: &Value, key: &str) -> Option<String> {
    let mut current = val;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    current.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(val: &Value, prefix: &str, out: &mut Vec<String>) {
        if let Some(obj) = val.as_object() {
            for (k, v) in obj {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                if v.is_object() {
                    keys(v, &path, out);
                } else {
                    out.push(path);
                }
            }
        }
    }

    #[test]
    fn test_catalogues_have_same_keys() {
        let tr: Value = serde_json::from_str(include_str!("tr.json")).unwrap();
        let en: Value = serde_json::from_str(include_str!("en.json")).unwrap();
        let (mut tr_keys, mut en_keys) = (Vec::new(), Vec::new());
        keys(&tr, "", &mut tr_keys);
        keys(&en, "", &mut en_keys);
        tr_keys.sort();
        en_keys.sort();
        assert_eq!(tr_keys, en_keys);
    }

    #[test]
    fn test_lookup_and_fallback() {
        assert!(is_supported("tr"));
        assert!(!is_supported("xx"));
        assert_eq!(get_text("xx", "tag.done"), get_text("en", "tag.done"));
        assert_eq!(get_text("tr", "no.such.key"), "no.such.key");
    }
}
