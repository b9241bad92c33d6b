//! In-memory instance store.

use async_trait::async_trait;
use meridian_core::InstanceRecord;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::{InstanceStore, new_token};

type Key = (String, String);

/// Process-local store. Records are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryInstanceStore {
    records: RwLock<BTreeMap<Key, InstanceRecord>>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all partitions.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn put(
        &self,
        org_id: &str,
        instance_id: &str,
        record: &InstanceRecord,
    ) -> Result<String, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockError)?;
        records.insert(
            (org_id.to_string(), instance_id.to_string()),
            record.clone(),
        );
        Ok(new_token())
    }

    async fn find_one(
        &self,
        org_id: &str,
        instance_id: &str,
    ) -> Result<Option<InstanceRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::LockError)?;
        Ok(records
            .get(&(org_id.to_string(), instance_id.to_string()))
            .cloned())
    }

    async fn delete_one(&self, org_id: &str, instance_id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockError)?;
        Ok(records
            .remove(&(org_id.to_string(), instance_id.to_string()))
            .is_some())
    }
}
