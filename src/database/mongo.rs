//! MongoDB database wrapper.

use mongodb::bson::doc;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use tracing::info;

/// Collection names.
pub const FILTERS: &str = "filters";
pub const CHAT_SETTINGS: &str = "chat_settings";
pub const TAG_SESSIONS: &str = "tag_sessions";
pub const MEMBERS: &str = "members";

/// Database wrapper for MongoDB operations.
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB with the given URI and database name.
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection string
    /// * `db_name` - Database name to use
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        let db = client.database(db_name);
        let database = Self { client, db };
        database.ensure_indexes().await?;

        Ok(database)
    }

    /// Unique keys backing the upsert semantics of every repository.
    async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.db
            .collection::<mongodb::bson::Document>(FILTERS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "chat_id": 1, "keyword": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        for name in [CHAT_SETTINGS, TAG_SESSIONS] {
            self.db
                .collection::<mongodb::bson::Document>(name)
                .create_index(
                    IndexModel::builder()
                        .keys(doc! { "chat_id": 1 })
                        .options(unique())
                        .build(),
                )
                .await?;
        }

        self.db
            .collection::<mongodb::bson::Document>(MEMBERS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "chat_id": 1, "user_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        info!("Database indexes ensured");
        Ok(())
    }

    /// Get a typed collection from the database.
    ///
    /// # Arguments
    /// * `name` - Collection name
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    /// Close the connection pool.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
        info!("MongoDB connection closed");
    }
}
