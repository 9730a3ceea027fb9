//! Storage contracts.
//!
//! Handlers only see these traits. `repository` implements them on MongoDB,
//! `memory` keeps everything in process.

use async_trait::async_trait;

use super::models::{ChatSettings, FilterRecord, Member, PermissionSnapshot, TagSession};

/// Filters keyed by `(chat_id, keyword)`.
#[async_trait]
pub trait FilterStore: Send + Sync {
    /// Insert or fully overwrite the filter with the same chat and keyword.
    ///
    /// An overwrite keeps the filter's original position in match order.
    async fn add_or_replace(&self, filter: FilterRecord) -> anyhow::Result<()>;

    /// Get a filter by keyword (case-insensitive).
    async fn get(&self, chat_id: i64, keyword: &str) -> anyhow::Result<Option<FilterRecord>>;

    /// All filters of a chat sorted by keyword, for display.
    async fn list_all(&self, chat_id: i64) -> anyhow::Result<Vec<FilterRecord>>;

    /// All filters of a chat in insertion order, for matching.
    async fn list_for_matching(&self, chat_id: i64) -> anyhow::Result<Vec<FilterRecord>>;

    /// Delete one filter. Returns whether it existed.
    async fn delete(&self, chat_id: i64, keyword: &str) -> anyhow::Result<bool>;

    /// Delete every filter of a chat. Returns how many were removed.
    async fn delete_all(&self, chat_id: i64) -> anyhow::Result<u64>;
}

/// Chat settings and tag sessions.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Settings for a chat, or defaults when none are stored.
    async fn get_settings(&self, chat_id: i64) -> anyhow::Result<ChatSettings>;

    async fn set_locked(&self, chat_id: i64, locked: bool) -> anyhow::Result<()>;

    /// Set admin-only mode. Deletion of non-admin commands follows the same value.
    async fn set_admin_only_mode(&self, chat_id: i64, enabled: bool) -> anyhow::Result<()>;

    /// Store a welcome template and enable welcomes, or clear it with `None`.
    async fn set_welcome_message(&self, chat_id: i64, message: Option<String>)
    -> anyhow::Result<()>;

    async fn set_welcome_enabled(&self, chat_id: i64, enabled: bool) -> anyhow::Result<()>;

    async fn save_previous_permissions(
        &self,
        chat_id: i64,
        snapshot: PermissionSnapshot,
    ) -> anyhow::Result<()>;

    async fn get_previous_permissions(
        &self,
        chat_id: i64,
    ) -> anyhow::Result<Option<PermissionSnapshot>>;

    async fn clear_previous_permissions(&self, chat_id: i64) -> anyhow::Result<()>;

    /// Start a session at index 0, replacing any previous one for the chat.
    async fn start_tag_session(
        &self,
        chat_id: i64,
        message: &str,
        started_by: u64,
    ) -> anyhow::Result<()>;

    /// The chat's session row, active or not.
    async fn get_tag_session(&self, chat_id: i64) -> anyhow::Result<Option<TagSession>>;

    async fn update_tag_index(&self, chat_id: i64, index: u64) -> anyhow::Result<()>;

    /// Mark the session inactive. Returns whether it was active.
    async fn stop_tag_session(&self, chat_id: i64) -> anyhow::Result<bool>;

    /// The chat's session if it is still running.
    async fn active_tag_session(&self, chat_id: i64) -> anyhow::Result<Option<TagSession>> {
        Ok(self.get_tag_session(chat_id).await?.filter(|s| s.is_active))
    }
}

/// Members seen per chat, in first-seen order.
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Insert or refresh a member.
    async fn save_member(&self, member: Member) -> anyhow::Result<()>;

    /// Save many members. Returns how many were written.
    async fn save_members(&self, members: Vec<Member>) -> anyhow::Result<usize> {
        let count = members.len();
        for member in members {
            self.save_member(member).await?;
        }
        Ok(count)
    }

    async fn list_members(&self, chat_id: i64) -> anyhow::Result<Vec<Member>>;

    async fn count_members(&self, chat_id: i64) -> anyhow::Result<u64>;

    /// Find a member by username (without @, case-insensitive).
    async fn find_by_username(&self, chat_id: i64, username: &str)
    -> anyhow::Result<Option<Member>>;

    /// Delete every member of a chat. Returns how many were removed.
    async fn delete_all_members(&self, chat_id: i64) -> anyhow::Result<u64>;
}
