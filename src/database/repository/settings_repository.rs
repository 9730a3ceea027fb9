//! Chat settings and tag session repository.

use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::{ReplaceOptions, UpdateOptions};
use mongodb::Collection;

use crate::cache::{CacheConfig, TypedCache};
use crate::database::models::{ChatSettings, PermissionSnapshot, TagSession};
use crate::database::mongo::{Database, CHAT_SETTINGS, TAG_SESSIONS};
use crate::database::store::SettingsStore;

/// Repository for per-chat settings and the chat's tag session.
pub struct SettingsRepository {
    settings: Collection<ChatSettings>,
    sessions: Collection<TagSession>,
    /// Settings are read on every command. Tag sessions are never cached
    /// because a running loop must see /durdur.
    cache: TypedCache<i64, ChatSettings>,
}

impl SettingsRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            settings: db.collection(CHAT_SETTINGS),
            sessions: db.collection(TAG_SESSIONS),
            cache: TypedCache::new("chat_settings", CacheConfig::chat_settings()),
        }
    }

    /// Upsert some fields; a new row gets defaults for everything else.
    async fn set_fields(&self, chat_id: i64, fields: Document) -> Result<()> {
        let mut on_insert = bson::to_document(&ChatSettings::new(chat_id))?;
        on_insert.remove("chat_id");
        for key in fields.keys() {
            on_insert.remove(key);
        }

        let options = UpdateOptions::builder().upsert(true).build();
        self.settings
            .update_one(
                doc! { "chat_id": chat_id },
                doc! { "$set": fields, "$setOnInsert": on_insert },
            )
            .with_options(options)
            .await?;

        self.cache.invalidate(&chat_id);
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SettingsRepository {
    async fn get_settings(&self, chat_id: i64) -> Result<ChatSettings> {
        self.cache
            .get_or_try_load(chat_id, || async {
                let stored = self.settings.find_one(doc! { "chat_id": chat_id }).await?;
                Ok::<_, anyhow::Error>(stored.unwrap_or_else(|| ChatSettings::new(chat_id)))
            })
            .await
    }

    async fn set_locked(&self, chat_id: i64, locked: bool) -> Result<()> {
        self.set_fields(chat_id, doc! { "chat_locked": locked }).await
    }

    async fn set_admin_only_mode(&self, chat_id: i64, enabled: bool) -> Result<()> {
        self.set_fields(
            chat_id,
            doc! {
                "admin_only_commands": enabled,
                "delete_non_admin_commands": enabled,
            },
        )
        .await
    }

    async fn set_welcome_message(&self, chat_id: i64, message: Option<String>) -> Result<()> {
        let fields = match message {
            Some(text) => doc! { "welcome_message": text, "welcome_enabled": true },
            None => doc! { "welcome_message": Bson::Null },
        };
        self.set_fields(chat_id, fields).await
    }

    async fn set_welcome_enabled(&self, chat_id: i64, enabled: bool) -> Result<()> {
        self.set_fields(chat_id, doc! { "welcome_enabled": enabled }).await
    }

    async fn save_previous_permissions(
        &self,
        chat_id: i64,
        snapshot: PermissionSnapshot,
    ) -> Result<()> {
        let snapshot = bson::to_bson(&snapshot)?;
        self.set_fields(chat_id, doc! { "previous_permissions": snapshot })
            .await
    }

    async fn get_previous_permissions(&self, chat_id: i64) -> Result<Option<PermissionSnapshot>> {
        Ok(self.get_settings(chat_id).await?.previous_permissions)
    }

    async fn clear_previous_permissions(&self, chat_id: i64) -> Result<()> {
        self.set_fields(chat_id, doc! { "previous_permissions": Bson::Null })
            .await
    }

    async fn start_tag_session(&self, chat_id: i64, message: &str, started_by: u64) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.sessions
            .replace_one(
                doc! { "chat_id": chat_id },
                TagSession::start(chat_id, message, started_by),
            )
            .with_options(options)
            .await?;
        Ok(())
    }

    async fn get_tag_session(&self, chat_id: i64) -> Result<Option<TagSession>> {
        Ok(self.sessions.find_one(doc! { "chat_id": chat_id }).await?)
    }

    async fn update_tag_index(&self, chat_id: i64, index: u64) -> Result<()> {
        let index = i64::try_from(index)?;
        self.sessions
            .update_one(
                doc! { "chat_id": chat_id },
                doc! { "$set": { "current_index": index } },
            )
            .await?;
        Ok(())
    }

    async fn stop_tag_session(&self, chat_id: i64) -> Result<bool> {
        let result = self
            .sessions
            .update_one(
                doc! { "chat_id": chat_id, "is_active": true },
                doc! { "$set": { "is_active": false } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }
}
