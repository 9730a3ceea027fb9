//! Common shared models.

use serde::{Deserialize, Deserializer, Serialize};

/// Generic inline button for messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    /// Button text
    pub text: String,
    /// URL to open when clicked
    pub url: String,
}

impl InlineButton {
    /// Create a new inline button.
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// Deserialize button rows, treating anything malformed as "no buttons".
pub fn lenient_button_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<InlineButton>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Rows {
        Valid(Vec<Vec<InlineButton>>),
        Invalid(serde::de::IgnoredAny),
    }

    Ok(match Option::<Rows>::deserialize(deserializer)? {
        Some(Rows::Valid(rows)) => rows,
        _ => Vec::new(),
    })
}
