//! Per-chat settings model.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use teloxide::types::ChatPermissions;

fn default_true() -> bool {
    true
}

/// Chat configuration (stored in `chat_settings` collection, one row per chat).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Telegram chat ID (unique)
    pub chat_id: i64,

    /// Whether /lock is in effect
    #[serde(default)]
    pub chat_locked: bool,

    /// Whether new members get the welcome message
    #[serde(default = "default_true")]
    pub welcome_enabled: bool,

    /// Welcome template, rendered like a filter response
    #[serde(default)]
    pub welcome_message: Option<String>,

    /// Only admins may use bot commands
    #[serde(default = "default_true")]
    pub admin_only_commands: bool,

    /// Delete commands sent by non-admins while admin-only is on
    #[serde(default = "default_true")]
    pub delete_non_admin_commands: bool,

    /// Permissions captured by /lock, restored by /unlock
    #[serde(default)]
    pub previous_permissions: Option<PermissionSnapshot>,
}

impl ChatSettings {
    /// Default settings for a chat without a stored row.
    pub fn new(chat_id: i64) -> Self {
        Self {
            id: None,
            chat_id,
            chat_locked: false,
            welcome_enabled: true,
            welcome_message: None,
            admin_only_commands: true,
            delete_non_admin_commands: true,
            previous_permissions: None,
        }
    }
}

/// Serializable copy of a chat's default member permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    #[serde(default)]
    pub can_send_messages: bool,
    #[serde(default)]
    pub can_send_audios: bool,
    #[serde(default)]
    pub can_send_documents: bool,
    #[serde(default)]
    pub can_send_photos: bool,
    #[serde(default)]
    pub can_send_videos: bool,
    #[serde(default)]
    pub can_send_video_notes: bool,
    #[serde(default)]
    pub can_send_voice_notes: bool,
    #[serde(default)]
    pub can_send_polls: bool,
    #[serde(default)]
    pub can_send_other_messages: bool,
    #[serde(default)]
    pub can_add_web_page_previews: bool,
    #[serde(default)]
    pub can_change_info: bool,
    #[serde(default)]
    pub can_invite_users: bool,
    #[serde(default)]
    pub can_pin_messages: bool,
    #[serde(default)]
    pub can_manage_topics: bool,
}

impl PermissionSnapshot {
    fn pairs(&self) -> [(bool, ChatPermissions); 14] {
        [
            (self.can_send_messages, ChatPermissions::SEND_MESSAGES),
            (self.can_send_audios, ChatPermissions::SEND_AUDIOS),
            (self.can_send_documents, ChatPermissions::SEND_DOCUMENTS),
            (self.can_send_photos, ChatPermissions::SEND_PHOTOS),
            (self.can_send_videos, ChatPermissions::SEND_VIDEOS),
            (self.can_send_video_notes, ChatPermissions::SEND_VIDEO_NOTES),
            (self.can_send_voice_notes, ChatPermissions::SEND_VOICE_NOTES),
            (self.can_send_polls, ChatPermissions::SEND_POLLS),
            (self.can_send_other_messages, ChatPermissions::SEND_OTHER_MESSAGES),
            (self.can_add_web_page_previews, ChatPermissions::ADD_WEB_PAGE_PREVIEWS),
            (self.can_change_info, ChatPermissions::CHANGE_INFO),
            (self.can_invite_users, ChatPermissions::INVITE_USERS),
            (self.can_pin_messages, ChatPermissions::PIN_MESSAGES),
            (self.can_manage_topics, ChatPermissions::MANAGE_TOPICS),
        ]
    }

    /// Convert back to Telegram permission flags.
    pub fn to_permissions(&self) -> ChatPermissions {
        self.pairs()
            .into_iter()
            .filter(|(allowed, _)| *allowed)
            .fold(ChatPermissions::empty(), |acc, (_, flag)| acc | flag)
    }
}

impl From<ChatPermissions> for PermissionSnapshot {
    fn from(perms: ChatPermissions) -> Self {
        Self {
            can_send_messages: perms.contains(ChatPermissions::SEND_MESSAGES),
            can_send_audios: perms.contains(ChatPermissions::SEND_AUDIOS),
            can_send_documents: perms.contains(ChatPermissions::SEND_DOCUMENTS),
            can_send_photos: perms.contains(ChatPermissions::SEND_PHOTOS),
            can_send_videos: perms.contains(ChatPermissions::SEND_VIDEOS),
            can_send_video_notes: perms.contains(ChatPermissions::SEND_VIDEO_NOTES),
            can_send_voice_notes: perms.contains(ChatPermissions::SEND_VOICE_NOTES),
            can_send_polls: perms.contains(ChatPermissions::SEND_POLLS),
            can_send_other_messages: perms.contains(ChatPermissions::SEND_OTHER_MESSAGES),
            can_add_web_page_previews: perms.contains(ChatPermissions::ADD_WEB_PAGE_PREVIEWS),
            can_change_info: perms.contains(ChatPermissions::CHANGE_INFO),
            can_invite_users: perms.contains(ChatPermissions::INVITE_USERS),
            can_pin_messages: perms.contains(ChatPermissions::PIN_MESSAGES),
            can_manage_topics: perms.contains(ChatPermissions::MANAGE_TOPICS),
        }
    }
}

/// Permissions applied by /unlock when nothing was captured: members may
/// send anything and invite others.
pub fn default_member_permissions() -> ChatPermissions {
    ChatPermissions::SEND_MESSAGES
        | ChatPermissions::SEND_AUDIOS
        | ChatPermissions::SEND_DOCUMENTS
        | ChatPermissions::SEND_PHOTOS
        | ChatPermissions::SEND_VIDEOS
        | ChatPermissions::SEND_VIDEO_NOTES
        | ChatPermissions::SEND_VOICE_NOTES
        | ChatPermissions::SEND_POLLS
        | ChatPermissions::SEND_OTHER_MESSAGES
        | ChatPermissions::ADD_WEB_PAGE_PREVIEWS
        | ChatPermissions::INVITE_USERS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ChatSettings::new(-100);
        assert!(settings.admin_only_commands);
        assert!(settings.delete_non_admin_commands);
        assert!(settings.welcome_enabled);
        assert!(!settings.chat_locked);
        assert!(settings.previous_permissions.is_none());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let perms = ChatPermissions::SEND_MESSAGES
            | ChatPermissions::SEND_PHOTOS
            | ChatPermissions::INVITE_USERS;
        let snapshot = PermissionSnapshot::from(perms);
        assert!(snapshot.can_send_messages);
        assert!(!snapshot.can_send_polls);
        assert_eq!(snapshot.to_permissions(), perms);
    }
}
