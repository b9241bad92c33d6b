//! File-based instance store.
//!
//! Each organization partition is one JSON Lines file (`<org_id>.jsonl`) in
//! the store directory. Files are loaded into memory on open and the
//! partition file is rewritten on every mutation, so the on-disk state always
//! matches the cache and can be inspected with standard tools (jq, grep).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meridian_core::InstanceRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::StoreError;
use crate::{InstanceStore, new_token};

const FILE_EXTENSION: &str = "jsonl";

/// One line of a partition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredLine {
    instance_id: String,
    token: String,
    updated_at: DateTime<Utc>,
    record: InstanceRecord,
}

type Partition = BTreeMap<String, StoredLine>;

/// JSON Lines store, one file per organization.
pub struct FileInstanceStore {
    directory: PathBuf,
    partitions: RwLock<BTreeMap<String, Partition>>,
}

impl FileInstanceStore {
    /// Open the store, creating the directory if needed and loading every
    /// existing partition file.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self, StoreError> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.exists() {
            fs::create_dir_all(&directory)?;
        }

        let mut partitions = BTreeMap::new();
        for entry in fs::read_dir(&directory)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let Some(org_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let partition = Self::load_partition(&path)?;
            tracing::debug!(org_id = %org_id, records = partition.len(), "Loaded store partition");
            partitions.insert(org_id.to_string(), partition);
        }

        tracing::info!(
            directory = %directory.display(),
            partitions = partitions.len(),
            "Opened file instance store"
        );

        Ok(Self {
            directory,
            partitions: RwLock::new(partitions),
        })
    }

    fn partition_path(&self, org_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !org_id.is_empty()
            && !org_id.starts_with('.')
            && !org_id.contains(['/', '\\']);
        if !valid {
            return Err(StoreError::InvalidPartition(org_id.to_string()));
        }
        Ok(self
            .directory
            .join(format!("{}.{}", org_id, FILE_EXTENSION)))
    }

    fn load_partition(path: &Path) -> Result<Partition, StoreError> {
        let reader = BufReader::new(fs::File::open(path)?);
        let mut partition = Partition::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<StoredLine>(line) {
                Ok(stored) => {
                    partition.insert(stored.instance_id.clone(), stored);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        line = line_num + 1,
                        error = %e,
                        "Skipping unreadable instance record"
                    );
                }
            }
        }

        Ok(partition)
    }

    fn rewrite_file(path: &Path, partition: &Partition) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        for stored in partition.values() {
            let json = serde_json::to_string(stored)?;
            writeln!(file, "{}", json)?;
        }

        Ok(())
    }
}

#[async_trait]
impl InstanceStore for FileInstanceStore {
    async fn put(
        &self,
        org_id: &str,
        instance_id: &str,
        record: &InstanceRecord,
    ) -> Result<String, StoreError> {
        let path = self.partition_path(org_id)?;
        let token = new_token();

        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| StoreError::LockError)?;
        let partition = partitions.entry(org_id.to_string()).or_default();
        let previous = partition.insert(
            instance_id.to_string(),
            StoredLine {
                instance_id: instance_id.to_string(),
                token: token.clone(),
                updated_at: Utc::now(),
                record: record.clone(),
            },
        );

        if let Err(e) = Self::rewrite_file(&path, partition) {
            // Keep the cache in line with the file.
            match previous {
                Some(prev) => {
                    partition.insert(instance_id.to_string(), prev);
                }
                None => {
                    partition.remove(instance_id);
                }
            }
            return Err(e);
        }

        tracing::debug!(org_id = %org_id, instance_id = %instance_id, "Stored instance record");
        Ok(token)
    }

    async fn find_one(
        &self,
        org_id: &str,
        instance_id: &str,
    ) -> Result<Option<InstanceRecord>, StoreError> {
        self.partition_path(org_id)?;
        let partitions = self
            .partitions
            .read()
            .map_err(|_| StoreError::LockError)?;
        Ok(partitions
            .get(org_id)
            .and_then(|p| p.get(instance_id))
            .map(|stored| stored.record.clone()))
    }

    async fn delete_one(&self, org_id: &str, instance_id: &str) -> Result<bool, StoreError> {
        let path = self.partition_path(org_id)?;
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| StoreError::LockError)?;
        let Some(partition) = partitions.get_mut(org_id) else {
            return Ok(false);
        };
        let Some(removed) = partition.remove(instance_id) else {
            return Ok(false);
        };

        if let Err(e) = Self::rewrite_file(&path, partition) {
            partition.insert(instance_id.to_string(), removed);
            return Err(e);
        }

        tracing::debug!(org_id = %org_id, instance_id = %instance_id, "Deleted instance record");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::record;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileInstanceStore::open(dir.path()).unwrap();
            store.put("org-a", "inst-1", &record("p1")).await.unwrap();
            store.put("org-a", "inst-2", &record("p2")).await.unwrap();
            store.put("org-b", "inst-1", &record("p3")).await.unwrap();
            assert!(store.delete_one("org-a", "inst-2").await.unwrap());
        }

        let store = FileInstanceStore::open(dir.path()).unwrap();
        let found = store.find_one("org-a", "inst-1").await.unwrap().unwrap();
        assert_eq!(found.plan_id, "p1");
        assert!(store.find_one("org-a", "inst-2").await.unwrap().is_none());
        assert_eq!(
            store.find_one("org-b", "inst-1").await.unwrap().unwrap().plan_id,
            "p3"
        );

        let contents = fs::read_to_string(dir.path().join("org-a.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let good = StoredLine {
            instance_id: "inst-1".to_string(),
            token: "t".to_string(),
            updated_at: Utc::now(),
            record: record("p1"),
        };
        fs::write(
            dir.path().join("org-a.jsonl"),
            format!("not json\n{}\n\n", serde_json::to_string(&good).unwrap()),
        )
        .unwrap();

        let store = FileInstanceStore::open(dir.path()).unwrap();
        assert!(store.find_one("org-a", "inst-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rejects_path_like_partitions() {
        let dir = TempDir::new().unwrap();
        let store = FileInstanceStore::open(dir.path()).unwrap();

        let err = store
            .put("../escape", "inst-1", &record("p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPartition(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_record() {
        let dir = TempDir::new().unwrap();
        let store = FileInstanceStore::open(dir.path()).unwrap();
        assert!(!store.delete_one("org-a", "missing").await.unwrap());
    }
}
