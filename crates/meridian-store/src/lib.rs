//! # meridian-store
//!
//! Durable snapshots of provisioned instances, partitioned by organization.
//!
//! Backends:
//! - [`MemoryInstanceStore`]: process memory
//! - [`FileInstanceStore`]: one JSON Lines file per organization
//! - [`PgInstanceStore`]: Postgres table `meridian_instances`

pub mod error;
pub mod file;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use meridian_core::{InstanceRecord, StoreBackend, StoreConfig};
use std::sync::Arc;

pub use error::StoreError;
pub use file::FileInstanceStore;
pub use memory::MemoryInstanceStore;
pub use postgres::PgInstanceStore;

/// Persistence contract for instance records.
///
/// At most one live record exists per `(org_id, instance_id)`; `put`
/// overwrites it.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Write the record and return a fresh opaque token.
    async fn put(
        &self,
        org_id: &str,
        instance_id: &str,
        record: &InstanceRecord,
    ) -> Result<String, StoreError>;

    async fn find_one(
        &self,
        org_id: &str,
        instance_id: &str,
    ) -> Result<Option<InstanceRecord>, StoreError>;

    /// Remove the record. Returns whether one existed.
    async fn delete_one(&self, org_id: &str, instance_id: &str) -> Result<bool, StoreError>;
}

/// Create the backend selected by configuration.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn InstanceStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryInstanceStore::new())),
        StoreBackend::File => {
            let dir = config.directory.as_ref().ok_or_else(|| {
                StoreError::Config("store.directory is required for the file backend".to_string())
            })?;
            Ok(Arc::new(FileInstanceStore::open(dir)?))
        }
        StoreBackend::Postgres => {
            let url = config.database_url().ok_or_else(|| {
                StoreError::Config(
                    "store.database_url is required for the postgres backend".to_string(),
                )
            })?;
            Ok(Arc::new(
                PgInstanceStore::connect(&url, config.max_connections).await?,
            ))
        }
    }
}

pub(crate) fn new_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use meridian_core::{Plan, encode_plan};
    use tempfile::TempDir;

    pub(crate) fn record(plan_id: &str) -> InstanceRecord {
        InstanceRecord {
            plan_id: plan_id.to_string(),
            service_id: "meridian-service-template".to_string(),
            dashboard_url: String::new(),
            parameters: encode_plan(&Plan::default()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_store_memory_default() {
        let store = create_store(&StoreConfig::default()).await.unwrap();
        store.put("org-a", "inst-1", &record("p1")).await.unwrap();
        assert!(store.find_one("org-a", "inst-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_store_file_backend() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig {
            backend: StoreBackend::File,
            directory: Some(dir.path().join("state")),
            ..Default::default()
        };
        let store = create_store(&config).await.unwrap();
        store.put("org-a", "inst-1", &record("p1")).await.unwrap();
        assert!(dir.path().join("state").join("org-a.jsonl").exists());
    }

    #[tokio::test]
    async fn test_create_store_requires_settings() {
        let config = StoreConfig {
            backend: StoreBackend::Postgres,
            ..Default::default()
        };
        assert!(matches!(
            create_store(&config).await,
            Err(StoreError::Config(_))
        ));
    }
}
