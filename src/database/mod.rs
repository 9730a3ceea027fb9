//! Database module exports.
//!
//! Storage is an explicitly constructed [`Storage`] bundle, opened once in
//! `main` and handed to the dispatcher through `AppState`.

pub mod memory;
pub mod models;
mod mongo;
mod repository;
pub mod store;

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, StorageBackend};

pub use memory::MemoryStore;
pub use models::*;
pub use mongo::Database;
pub use repository::{FilterRepository, MemberRepository, SettingsRepository};
pub use store::{FilterStore, MemberStore, SettingsStore};

/// Every store the bot talks to.
#[derive(Clone)]
pub struct Storage {
    pub filters: Arc<dyn FilterStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub members: Arc<dyn MemberStore>,
    /// Present for the MongoDB backend, closed on shutdown.
    db: Option<Database>,
}

impl Storage {
    /// Open the backend selected by the configuration.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        match &config.storage {
            StorageBackend::MongoDb { uri, database } => {
                info!("Connecting to MongoDB...");
                let db = Database::connect(uri, database).await?;
                Ok(Self {
                    filters: Arc::new(FilterRepository::new(&db)),
                    settings: Arc::new(SettingsRepository::new(&db)),
                    members: Arc::new(MemberRepository::new(&db)),
                    db: Some(db),
                })
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage, nothing survives a restart");
                Ok(Self::in_memory())
            }
        }
    }

    /// All three stores backed by one [`MemoryStore`].
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            filters: store.clone(),
            settings: store.clone(),
            members: store,
            db: None,
        }
    }

    /// Release the connection pool, if any.
    pub async fn close(self) {
        if let Some(db) = self.db {
            db.shutdown().await;
        }
    }
}
