//! Filter repository with a per-chat read-through cache.
//!
//! The matcher reads a chat's whole filter set on every group message, so the
//! set is cached in insertion order and dropped on any write to that chat.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ReplaceOptions;
use mongodb::Collection;
use tracing::{debug, warn};

use crate::cache::{CacheConfig, TypedCache};
use crate::database::models::{normalize_keyword, FilterRecord};
use crate::database::mongo::{Database, FILTERS};
use crate::database::store::FilterStore;

/// Repository for filters.
pub struct FilterRepository {
    collection: Collection<FilterRecord>,
    /// ChatID -> filters in insertion order
    sets: TypedCache<i64, Arc<Vec<FilterRecord>>>,
}

impl FilterRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(FILTERS),
            sets: TypedCache::new("filter_sets", CacheConfig::filter_sets()),
        }
    }

    /// Fetch a chat's filters in the given order, skipping unreadable documents.
    async fn fetch(&self, chat_id: i64, sort: Document) -> Result<Vec<FilterRecord>> {
        let mut cursor = self
            .collection
            .find(doc! { "chat_id": chat_id })
            .sort(sort)
            .await?;

        let mut filters = Vec::new();
        while let Some(result) = cursor.next().await {
            match result {
                Ok(filter) => filters.push(filter),
                Err(e) => warn!("Skipping unreadable filter in chat {}: {}", chat_id, e),
            }
        }
        Ok(filters)
    }
}

#[async_trait]
impl FilterStore for FilterRepository {
    async fn add_or_replace(&self, filter: FilterRecord) -> Result<()> {
        let key = doc! {
            "chat_id": filter.chat_id,
            "keyword": &filter.keyword
        };
        let options = ReplaceOptions::builder().upsert(true).build();

        // Full replacement: fields missing from `filter` are cleared, `_id` is kept.
        self.collection
            .replace_one(key, &filter)
            .with_options(options)
            .await?;

        self.sets.invalidate(&filter.chat_id);
        debug!("Saved filter '{}' in chat {}", filter.keyword, filter.chat_id);
        Ok(())
    }

    async fn get(&self, chat_id: i64, keyword: &str) -> Result<Option<FilterRecord>> {
        let key = doc! {
            "chat_id": chat_id,
            "keyword": normalize_keyword(keyword)
        };
        Ok(self.collection.find_one(key).await?)
    }

    async fn list_all(&self, chat_id: i64) -> Result<Vec<FilterRecord>> {
        self.fetch(chat_id, doc! { "keyword": 1 }).await
    }

    async fn list_for_matching(&self, chat_id: i64) -> Result<Vec<FilterRecord>> {
        // ObjectIds grow with insertion time and survive replace_one.
        let filters = self
            .sets
            .get_or_try_load(chat_id, || async {
                Ok::<_, anyhow::Error>(Arc::new(self.fetch(chat_id, doc! { "_id": 1 }).await?))
            })
            .await?;
        Ok(filters.as_ref().clone())
    }

    async fn delete(&self, chat_id: i64, keyword: &str) -> Result<bool> {
        let key = doc! {
            "chat_id": chat_id,
            "keyword": normalize_keyword(keyword)
        };
        let result = self.collection.delete_one(key).await?;
        self.sets.invalidate(&chat_id);
        Ok(result.deleted_count > 0)
    }

    async fn delete_all(&self, chat_id: i64) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "chat_id": chat_id })
            .await?;
        self.sets.invalidate(&chat_id);
        Ok(result.deleted_count)
    }
}
