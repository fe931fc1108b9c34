//! Upload records
//!
//! One record is written per successful upload. Records are never
//! updated or deleted by this service.

use crate::upload::HostedAsset;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod mongo;

pub use memory::MemoryRecordStore;
pub use mongo::MongoRecordStore;

/// Persistence errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record validation failed: {0}")]
    InvalidRecord(String),
}

/// A hosted image and where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Document id (ObjectId hex)
    #[serde(rename = "_id")]
    pub id: String,
    pub url: String,
    pub public_id: String,
    #[serde(
        rename = "originalName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub original_name: Option<String>,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Build a record for an asset the media host just stored
    pub fn from_asset(asset: &HostedAsset, original_name: Option<String>) -> Self {
        Self {
            id: ObjectId::new().to_hex(),
            url: asset.secure_url.clone(),
            public_id: asset.public_id.clone(),
            original_name,
            uploaded_at: Utc::now(),
        }
    }

    /// Check required fields before writing
    pub fn validate(&self) -> Result<(), PersistenceError> {
        if self.url.trim().is_empty() {
            return Err(PersistenceError::InvalidRecord("url is required".into()));
        }
        if self.public_id.trim().is_empty() {
            return Err(PersistenceError::InvalidRecord(
                "public_id is required".into(),
            ));
        }
        Ok(())
    }
}

/// Durable storage for upload records
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert one new record. No upsert, no deduplication.
    async fn insert(&self, record: &UploadRecord) -> Result<(), PersistenceError>;
}
