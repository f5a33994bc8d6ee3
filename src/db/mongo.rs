//! MongoDB client and the Mongo-backed identity store

use async_trait::async_trait;
use bson::{doc, DateTime, Document};
use futures_util::StreamExt;
use mongodb::{options::IndexOptions, Client, Collection, IndexModel};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::{Metadata, UserDoc, USER_COLLECTION};
use crate::db::store::IdentityStore;
use crate::types::{Result, WicketError};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping. Short server-selection timeouts keep startup
    /// from hanging on an unreachable database.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        let timeout_uri = if uri.contains('?') {
            format!("{uri}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        } else {
            format!("{uri}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| WicketError::Database(format!("Failed to connect to MongoDB: {e}")))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| WicketError::Database(format!("MongoDB ping failed: {e}")))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection with its schema indexes applied
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        let inner = self.client.database(&self.db_name).collection::<T>(name);
        let collection = MongoCollection { inner };
        collection.apply_indexes().await?;
        Ok(collection)
    }
}

/// Typed collection wrapper; all reads skip soft-deleted documents
pub struct MongoCollection<T>
where
    T: Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();
        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| WicketError::Database(format!("Failed to create indexes: {e}")))?;

        Ok(())
    }

    pub async fn insert_one(&self, mut item: T) -> Result<()> {
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        self.inner.insert_one(item).await.map_err(|e| {
            let message = e.to_string();
            if message.contains("E11000") || message.contains("duplicate key") {
                WicketError::Database("Duplicate key".into())
            } else {
                WicketError::Database(format!("Insert failed: {message}"))
            }
        })?;

        Ok(())
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        self.inner
            .find_one(full_filter)
            .await
            .map_err(|e| WicketError::Database(format!("Find failed: {e}")))
    }

    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        let cursor = self
            .inner
            .find(full_filter)
            .await
            .map_err(|e| WicketError::Database(format!("Find failed: {e}")))?;

        let results: Vec<T> = cursor
            .filter_map(|item| async {
                match item {
                    Ok(doc) => Some(doc),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    pub async fn replace_one(&self, filter: Document, mut item: T) -> Result<u64> {
        item.mut_metadata().updated_at = Some(DateTime::now());

        let result = self
            .inner
            .replace_one(filter, item)
            .await
            .map_err(|e| WicketError::Database(format!("Replace failed: {e}")))?;

        Ok(result.matched_count)
    }

    pub async fn update_one(&self, filter: Document, update: Document) -> Result<u64> {
        let result = self
            .inner
            .update_one(filter, update)
            .await
            .map_err(|e| WicketError::Database(format!("Update failed: {e}")))?;

        Ok(result.matched_count)
    }

    pub async fn update_many(&self, filter: Document, update: Document) -> Result<u64> {
        let result = self
            .inner
            .update_many(filter, update)
            .await
            .map_err(|e| WicketError::Database(format!("Update failed: {e}")))?;

        Ok(result.modified_count)
    }

    pub async fn soft_delete(&self, filter: Document) -> Result<u64> {
        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": DateTime::now(),
                "metadata.updated_at": DateTime::now(),
            }
        };

        self.update_one(filter, update).await
    }
}

/// MongoDB-backed identity store
pub struct MongoIdentityStore {
    users: MongoCollection<UserDoc>,
}

impl MongoIdentityStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: client.collection::<UserDoc>(USER_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl IdentityStore for MongoIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "email": email }).await
    }

    async fn find_by_did(&self, did: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "did": did }).await
    }

    async fn find_by_access_token(&self, token: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "access_token": token }).await
    }

    async fn list_all(&self) -> Result<Vec<UserDoc>> {
        self.users.find_many(doc! {}).await
    }

    async fn insert(&self, user: UserDoc) -> Result<()> {
        // The unique indexes on email and blockchain_address reject
        // duplicates that race past the caller's checks.
        self.users.insert_one(user).await
    }

    async fn update(&self, user: &UserDoc) -> Result<()> {
        let matched = self
            .users
            .replace_one(doc! { "email": &user.email }, user.clone())
            .await?;

        if matched == 0 {
            return Err(WicketError::Database(format!(
                "No such identity: {}",
                user.email
            )));
        }

        Ok(())
    }

    async fn delete(&self, email: &str) -> Result<bool> {
        let matched = self.users.soft_delete(doc! { "email": email }).await?;
        Ok(matched > 0)
    }

    async fn set_exclusive_online(&self, email: &str, token: &str) -> Result<()> {
        // Two statements under the orchestrator's session lock. The
        // subject update is applied last so an interruption can leave at
        // most zero sessions online, never two.
        self.users
            .update_many(
                doc! { "email": { "$ne": email } },
                doc! { "$set": { "is_online": false, "metadata.updated_at": DateTime::now() } },
            )
            .await?;

        let matched = self
            .users
            .update_one(
                doc! { "email": email },
                doc! { "$set": {
                    "is_online": true,
                    "access_token": token,
                    "metadata.updated_at": DateTime::now(),
                } },
            )
            .await?;

        if matched == 0 {
            return Err(WicketError::Auth(format!("No such identity: {email}")));
        }

        Ok(())
    }
}
