//! MongoDB record store
//!
//! The client is created once at startup and kept for the life of the
//! process. The driver pools connections, so concurrent inserts from
//! different requests share it without extra locking.

use super::{PersistenceError, RecordStore, UploadRecord};
use crate::config::MongoConfig;
use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime};
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};

/// Database used when neither config nor URI names one
const FALLBACK_DATABASE: &str = "test";

/// Stored shape of an [`UploadRecord`]
#[derive(Debug, Serialize, Deserialize)]
struct RecordDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    url: String,
    public_id: String,
    #[serde(rename = "originalName", skip_serializing_if = "Option::is_none")]
    original_name: Option<String>,
    #[serde(rename = "uploadedAt")]
    uploaded_at: BsonDateTime,
}

impl TryFrom<&UploadRecord> for RecordDocument {
    type Error = PersistenceError;

    fn try_from(record: &UploadRecord) -> Result<Self, Self::Error> {
        let id = ObjectId::parse_str(&record.id)
            .map_err(|e| PersistenceError::InvalidRecord(format!("invalid _id: {}", e)))?;

        Ok(Self {
            id,
            url: record.url.clone(),
            public_id: record.public_id.clone(),
            original_name: record.original_name.clone(),
            uploaded_at: BsonDateTime::from_millis(record.uploaded_at.timestamp_millis()),
        })
    }
}

/// Record store backed by a MongoDB collection
pub struct MongoRecordStore {
    database: Database,
    collection: Collection<RecordDocument>,
}

impl MongoRecordStore {
    /// Create the client and start a background connectivity check
    ///
    /// The driver connects lazily, so this returns without waiting on the
    /// server. The ping runs on its own task and only logs its outcome: an
    /// unreachable database never holds up startup, and inserts fail
    /// individually until it is back. Only an unparseable URI is an error.
    pub async fn connect(config: &MongoConfig) -> Result<Self, PersistenceError> {
        let client = Client::with_uri_str(&config.uri)
            .await
            .map_err(|e| PersistenceError::Database(e.to_string()))?;

        let database = match &config.database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(FALLBACK_DATABASE)),
        };

        let store = Self {
            collection: database.collection(&config.collection),
            database,
        };

        let database = store.database.clone();
        let collection = config.collection.clone();
        tokio::spawn(async move {
            match ping(&database).await {
                Ok(()) => tracing::info!(
                    database = %database.name(),
                    collection = %collection,
                    "MongoDB connected"
                ),
                Err(e) => tracing::error!(error = %e, "MongoDB connection error"),
            }
        });

        Ok(store)
    }

    /// Round-trip a ping command
    pub async fn ping(&self) -> Result<(), PersistenceError> {
        ping(&self.database).await
    }
}

async fn ping(database: &Database) -> Result<(), PersistenceError> {
    database
        .run_command(doc! { "ping": 1 })
        .await
        .map(|_| ())
        .map_err(|e| PersistenceError::Database(e.to_string()))
}

#[async_trait]
impl RecordStore for MongoRecordStore {
    #[tracing::instrument(
        name = "mongodb.insert",
        skip(self, record),
        fields(record.id = %record.id, record.public_id = %record.public_id),
        err
    )]
    async fn insert(&self, record: &UploadRecord) -> Result<(), PersistenceError> {
        record.validate()?;
        let document = RecordDocument::try_from(record)?;

        self.collection
            .insert_one(&document)
            .await
            .map_err(|e| PersistenceError::Database(e.to_string()))?;

        tracing::debug!("Upload record inserted");
        Ok(())
    }
}
