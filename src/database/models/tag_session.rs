//! Tag session model: progress of a batched mention broadcast.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// One row per chat (stored in `tag_sessions` collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSession {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Chat ID (unique)
    pub chat_id: i64,

    /// Text sent with every batch of mentions
    pub message: String,

    /// Number of members already mentioned
    #[serde(default)]
    pub current_index: u64,

    /// Cleared on completion or /durdur
    #[serde(default)]
    pub is_active: bool,

    /// User who started the session
    pub started_by: u64,
}

impl TagSession {
    /// A fresh active session starting at the first member.
    pub fn start(chat_id: i64, message: impl Into<String>, started_by: u64) -> Self {
        Self {
            id: None,
            chat_id,
            message: message.into(),
            current_index: 0,
            is_active: true,
            started_by,
        }
    }
}
