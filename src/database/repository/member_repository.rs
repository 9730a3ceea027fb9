//! Member repository.

use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use mongodb::Collection;
use tracing::debug;

use crate::database::models::Member;
use crate::database::mongo::{Database, MEMBERS};
use crate::database::store::MemberStore;

/// Repository for members seen per chat.
pub struct MemberRepository {
    collection: Collection<Member>,
}

impl MemberRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(MEMBERS),
        }
    }
}

#[async_trait]
impl MemberStore for MemberRepository {
    async fn save_member(&self, member: Member) -> Result<()> {
        let key = doc! {
            "chat_id": member.chat_id,
            "user_id": i64::try_from(member.user_id)?
        };
        let options = ReplaceOptions::builder().upsert(true).build();

        self.collection
            .replace_one(key, &member)
            .with_options(options)
            .await?;

        debug!("Saved member {} in chat {}", member.user_id, member.chat_id);
        Ok(())
    }

    async fn list_members(&self, chat_id: i64) -> Result<Vec<Member>> {
        let cursor = self
            .collection
            .find(doc! { "chat_id": chat_id })
            .sort(doc! { "_id": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count_members(&self, chat_id: i64) -> Result<u64> {
        Ok(self
            .collection
            .count_documents(doc! { "chat_id": chat_id })
            .await?)
    }

    async fn find_by_username(&self, chat_id: i64, username: &str) -> Result<Option<Member>> {
        let key = username.trim_start_matches('@').to_lowercase();
        Ok(self
            .collection
            .find_one(doc! { "chat_id": chat_id, "username_key": key })
            .await?)
    }

    async fn delete_all_members(&self, chat_id: i64) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "chat_id": chat_id })
            .await?;
        Ok(result.deleted_count)
    }
}
