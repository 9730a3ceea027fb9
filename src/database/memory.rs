//! In-process storage backend.
//!
//! Same semantics as the MongoDB repositories, kept in `DashMap`s.
//! Used by tests and by `STORAGE_BACKEND=memory`.

use async_trait::async_trait;
use dashmap::DashMap;

use super::models::{
    normalize_keyword, ChatSettings, FilterRecord, Member, PermissionSnapshot, TagSession,
};
use super::store::{FilterStore, MemberStore, SettingsStore};

/// Storage that lives as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    /// Filters per chat, in insertion order
    filters: DashMap<i64, Vec<FilterRecord>>,
    settings: DashMap<i64, ChatSettings>,
    tag_sessions: DashMap<i64, TagSession>,
    /// Members per chat, in first-seen order
    members: DashMap<i64, Vec<Member>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn put_settings(&self, settings: ChatSettings) {
        self.settings.insert(settings.chat_id, settings);
    }

    fn update_settings(&self, chat_id: i64, f: impl FnOnce(&mut ChatSettings)) {
        let mut entry = self
            .settings
            .entry(chat_id)
            .or_insert_with(|| ChatSettings::new(chat_id));
        f(&mut entry);
    }
}

#[async_trait]
impl FilterStore for MemoryStore {
    async fn add_or_replace(&self, filter: FilterRecord) -> anyhow::Result<()> {
        let mut chat = self.filters.entry(filter.chat_id).or_default();
        match chat.iter().position(|f| f.keyword == filter.keyword) {
            Some(idx) => chat[idx] = filter,
            None => chat.push(filter),
        }
        Ok(())
    }

    async fn get(&self, chat_id: i64, keyword: &str) -> anyhow::Result<Option<FilterRecord>> {
        let keyword = normalize_keyword(keyword);
        Ok(self
            .filters
            .get(&chat_id)
            .and_then(|chat| chat.iter().find(|f| f.keyword == keyword).cloned()))
    }

    async fn list_all(&self, chat_id: i64) -> anyhow::Result<Vec<FilterRecord>> {
        let mut filters = self.list_for_matching(chat_id).await?;
        filters.sort_by(|a, b| a.keyword.cmp(&b.keyword));
        Ok(filters)
    }

    async fn list_for_matching(&self, chat_id: i64) -> anyhow::Result<Vec<FilterRecord>> {
        Ok(self
            .filters
            .get(&chat_id)
            .map(|chat| chat.clone())
            .unwrap_or_default())
    }

    async fn delete(&self, chat_id: i64, keyword: &str) -> anyhow::Result<bool> {
        let keyword = normalize_keyword(keyword);
        let Some(mut chat) = self.filters.get_mut(&chat_id) else {
            return Ok(false);
        };
        let before = chat.len();
        chat.retain(|f| f.keyword != keyword);
        Ok(chat.len() != before)
    }

    async fn delete_all(&self, chat_id: i64) -> anyhow::Result<u64> {
        Ok(self
            .filters
            .remove(&chat_id)
            .map(|(_, chat)| chat.len() as u64)
            .unwrap_or(0))
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_settings(&self, chat_id: i64) -> anyhow::Result<ChatSettings> {
        Ok(self
            .settings
            .get(&chat_id)
            .map(|s| s.clone())
            .unwrap_or_else(|| ChatSettings::new(chat_id)))
    }

    async fn set_locked(&self, chat_id: i64, locked: bool) -> anyhow::Result<()> {
        self.update_settings(chat_id, |s| s.chat_locked = locked);
        Ok(())
    }

    async fn set_admin_only_mode(&self, chat_id: i64, enabled: bool) -> anyhow::Result<()> {
        self.update_settings(chat_id, |s| {
            s.admin_only_commands = enabled;
            s.delete_non_admin_commands = enabled;
        });
        Ok(())
    }

    async fn set_welcome_message(
        &self,
        chat_id: i64,
        message: Option<String>,
    ) -> anyhow::Result<()> {
        self.update_settings(chat_id, |s| {
            if message.is_some() {
                s.welcome_enabled = true;
            }
            s.welcome_message = message;
        });
        Ok(())
    }

    async fn set_welcome_enabled(&self, chat_id: i64, enabled: bool) -> anyhow::Result<()> {
        self.update_settings(chat_id, |s| s.welcome_enabled = enabled);
        Ok(())
    }

    async fn save_previous_permissions(
        &self,
        chat_id: i64,
        snapshot: PermissionSnapshot,
    ) -> anyhow::Result<()> {
        self.update_settings(chat_id, |s| s.previous_permissions = Some(snapshot));
        Ok(())
    }

    async fn get_previous_permissions(
        &self,
        chat_id: i64,
    ) -> anyhow::Result<Option<PermissionSnapshot>> {
        Ok(self
            .settings
            .get(&chat_id)
            .and_then(|s| s.previous_permissions))
    }

    async fn clear_previous_permissions(&self, chat_id: i64) -> anyhow::Result<()> {
        if let Some(mut settings) = self.settings.get_mut(&chat_id) {
            settings.previous_permissions = None;
        }
        Ok(())
    }

    async fn start_tag_session(
        &self,
        chat_id: i64,
        message: &str,
        started_by: u64,
    ) -> anyhow::Result<()> {
        self.tag_sessions
            .insert(chat_id, TagSession::start(chat_id, message, started_by));
        Ok(())
    }

    async fn get_tag_session(&self, chat_id: i64) -> anyhow::Result<Option<TagSession>> {
        Ok(self.tag_sessions.get(&chat_id).map(|s| s.clone()))
    }

    async fn update_tag_index(&self, chat_id: i64, index: u64) -> anyhow::Result<()> {
        if let Some(mut session) = self.tag_sessions.get_mut(&chat_id) {
            session.current_index = index;
        }
        Ok(())
    }

    async fn stop_tag_session(&self, chat_id: i64) -> anyhow::Result<bool> {
        Ok(match self.tag_sessions.get_mut(&chat_id) {
            Some(mut session) => std::mem::replace(&mut session.is_active, false),
            None => false,
        })
    }
}

#[async_trait]
impl MemberStore for MemoryStore {
    async fn save_member(&self, member: Member) -> anyhow::Result<()> {
        let mut chat = self.members.entry(member.chat_id).or_default();
        match chat.iter().position(|m| m.user_id == member.user_id) {
            Some(idx) => chat[idx] = member,
            None => chat.push(member),
        }
        Ok(())
    }

    async fn list_members(&self, chat_id: i64) -> anyhow::Result<Vec<Member>> {
        Ok(self
            .members
            .get(&chat_id)
            .map(|chat| chat.clone())
            .unwrap_or_default())
    }

    async fn count_members(&self, chat_id: i64) -> anyhow::Result<u64> {
        Ok(self
            .members
            .get(&chat_id)
            .map(|chat| chat.len() as u64)
            .unwrap_or(0))
    }

    async fn find_by_username(
        &self,
        chat_id: i64,
        username: &str,
    ) -> anyhow::Result<Option<Member>> {
        let key = username.trim_start_matches('@').to_lowercase();
        Ok(self.members.get(&chat_id).and_then(|chat| {
            chat.iter()
                .find(|m| m.username_key.as_deref() == Some(key.as_str()))
                .cloned()
        }))
    }

    async fn delete_all_members(&self, chat_id: i64) -> anyhow::Result<u64> {
        Ok(self
            .members
            .remove(&chat_id)
            .map(|(_, chat)| chat.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{FilterContent, MediaKind};

    #[tokio::test]
    async fn test_upsert_clears_media() {
        let store = MemoryStore::new();
        let with_media = FilterRecord::new(
            1,
            "pic",
            FilterContent {
                response: Some("old".into()),
                media: Some((MediaKind::Photo, "file-1".into())),
                caption: Some("cap".into()),
                ..Default::default()
            },
        );
        store.add_or_replace(with_media).await.unwrap();
        store
            .add_or_replace(FilterRecord::new(1, "PIC", FilterContent::text("new")))
            .await
            .unwrap();

        let stored = store.get(1, "pic").await.unwrap().unwrap();
        assert_eq!(stored.response.as_deref(), Some("new"));
        assert!(stored.media().is_none());
        assert!(stored.caption.is_none());
        assert_eq!(store.list_all(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_orders() {
        let store = MemoryStore::new();
        for keyword in ["zeta", "alpha", "mid"] {
            store
                .add_or_replace(FilterRecord::new(1, keyword, FilterContent::text(keyword)))
                .await
                .unwrap();
        }
        // Overwrite keeps position in match order.
        store
            .add_or_replace(FilterRecord::new(1, "zeta", FilterContent::text("again")))
            .await
            .unwrap();

        let shown: Vec<_> = store.list_all(1).await.unwrap().into_iter().map(|f| f.keyword).collect();
        assert_eq!(shown, ["alpha", "mid", "zeta"]);

        let order: Vec<_> = store
            .list_for_matching(1)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.keyword)
            .collect();
        assert_eq!(order, ["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let store = MemoryStore::new();
        for keyword in ["a", "b", "c"] {
            store
                .add_or_replace(FilterRecord::new(7, keyword, FilterContent::text("x")))
                .await
                .unwrap();
        }
        assert!(store.delete(7, "B").await.unwrap());
        assert!(!store.delete(7, "b").await.unwrap());
        assert_eq!(store.delete_all(7).await.unwrap(), 2);
        assert_eq!(store.delete_all(7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_single_tag_session() {
        let store = MemoryStore::new();
        store.start_tag_session(5, "first", 10).await.unwrap();
        store.update_tag_index(5, 15).await.unwrap();
        store.start_tag_session(5, "second", 11).await.unwrap();

        assert_eq!(store.tag_sessions.len(), 1);
        let session = store.active_tag_session(5).await.unwrap().unwrap();
        assert_eq!(session.message, "second");
        assert_eq!(session.current_index, 0);
        assert_eq!(session.started_by, 11);

        assert!(store.stop_tag_session(5).await.unwrap());
        assert!(!store.stop_tag_session(5).await.unwrap());
        assert!(store.active_tag_session(5).await.unwrap().is_none());
        assert!(store.get_tag_session(5).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_settings_defaults_and_admin_only() {
        let store = MemoryStore::new();
        let defaults = store.get_settings(3).await.unwrap();
        assert!(defaults.admin_only_commands);

        store.set_admin_only_mode(3, false).await.unwrap();
        let settings = store.get_settings(3).await.unwrap();
        assert!(!settings.admin_only_commands);
        assert!(!settings.delete_non_admin_commands);
        assert_eq!(store.settings.len(), 1);
    }

    #[tokio::test]
    async fn test_permission_snapshot_round_trip() {
        let store = MemoryStore::new();
        let snapshot = PermissionSnapshot {
            can_send_messages: true,
            can_invite_users: true,
            ..Default::default()
        };
        store.save_previous_permissions(9, snapshot).await.unwrap();
        assert_eq!(store.get_previous_permissions(9).await.unwrap(), Some(snapshot));
        store.clear_previous_permissions(9).await.unwrap();
        assert_eq!(store.get_previous_permissions(9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_members() {
        let store = MemoryStore::new();
        store
            .save_member(Member::new(1, 10, Some("Alice".into()), Some("Alice".into())))
            .await
            .unwrap();
        store
            .save_members(vec![
                Member::new(1, 20, None, Some("Bob".into())),
                Member::new(1, 10, Some("alice_new".into()), Some("Alice".into())),
            ])
            .await
            .unwrap();

        assert_eq!(store.count_members(1).await.unwrap(), 2);
        let ids: Vec<_> = store.list_members(1).await.unwrap().iter().map(|m| m.user_id).collect();
        assert_eq!(ids, [10, 20]);
        assert!(store.find_by_username(1, "@ALICE_NEW").await.unwrap().is_some());
        assert!(store.find_by_username(1, "alice").await.unwrap().is_none());
        assert_eq!(store.delete_all_members(1).await.unwrap(), 2);
        assert_eq!(store.count_members(1).await.unwrap(), 0);
    }
}
