//! Member model: users seen in a chat, used to build mention lists.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use teloxide::types::User;

/// A user observed in a chat (stored in `members` collection).
///
/// Never authoritative for permissions; admin checks always ask Telegram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Chat the user was seen in
    pub chat_id: i64,

    /// Telegram user ID (unique per chat)
    pub user_id: u64,

    /// Username without @, original case
    #[serde(default)]
    pub username: Option<String>,

    /// Lowercase username for lookups
    #[serde(default)]
    pub username_key: Option<String>,

    /// First name
    #[serde(default)]
    pub first_name: Option<String>,
}

impl Member {
    /// Create a member record.
    pub fn new(
        chat_id: i64,
        user_id: u64,
        username: Option<String>,
        first_name: Option<String>,
    ) -> Self {
        let username = username.filter(|u| !u.is_empty());
        Self {
            id: None,
            chat_id,
            user_id,
            username_key: username.as_ref().map(|u| u.to_lowercase()),
            username,
            first_name: first_name.filter(|n| !n.is_empty()),
        }
    }

    /// Create a member record from a Telegram user.
    pub fn from_telegram(chat_id: i64, user: &User) -> Self {
        Self::new(
            chat_id,
            user.id.0,
            user.username.clone(),
            Some(user.first_name.clone()),
        )
    }
}
