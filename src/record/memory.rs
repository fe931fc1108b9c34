//! In-process record store for development and tests

use super::{PersistenceError, RecordStore, UploadRecord};
use async_trait::async_trait;
use std::sync::Mutex;

/// Keeps records in memory; nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<UploadRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, in insertion order
    pub fn records(&self) -> Vec<UploadRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &UploadRecord) -> Result<(), PersistenceError> {
        record.validate()?;
        self.records
            .lock()
            .map_err(|e| PersistenceError::Database(e.to_string()))?
            .push(record.clone());
        Ok(())
    }
}
