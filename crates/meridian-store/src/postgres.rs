//! Postgres instance store.

use async_trait::async_trait;
use chrono::Utc;
use meridian_core::InstanceRecord;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::InstanceStore;
use crate::error::StoreError;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS meridian_instances (
    org_id      TEXT        NOT NULL,
    instance_id TEXT        NOT NULL,
    token       UUID        NOT NULL,
    record      JSONB       NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (org_id, instance_id)
)
"#;

const UPSERT: &str = r#"
INSERT INTO meridian_instances (org_id, instance_id, token, record, updated_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (org_id, instance_id)
DO UPDATE SET token = EXCLUDED.token,
              record = EXCLUDED.record,
              updated_at = EXCLUDED.updated_at
"#;

const SELECT_ONE: &str =
    "SELECT record FROM meridian_instances WHERE org_id = $1 AND instance_id = $2";

const DELETE_ONE: &str = "DELETE FROM meridian_instances WHERE org_id = $1 AND instance_id = $2";

/// Store backed by the `meridian_instances` table.
pub struct PgInstanceStore {
    pool: PgPool,
}

impl PgInstanceStore {
    /// Connect and make sure the table exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self::from_pool(pool);
        store.ensure_schema().await?;
        tracing::info!(max_connections, "Connected Postgres instance store");
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl InstanceStore for PgInstanceStore {
    async fn put(
        &self,
        org_id: &str,
        instance_id: &str,
        record: &InstanceRecord,
    ) -> Result<String, StoreError> {
        let token = Uuid::new_v4();
        sqlx::query(UPSERT)
            .bind(org_id)
            .bind(instance_id)
            .bind(token)
            .bind(Json(record))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(token.to_string())
    }

    async fn find_one(
        &self,
        org_id: &str,
        instance_id: &str,
    ) -> Result<Option<InstanceRecord>, StoreError> {
        let row = sqlx::query(SELECT_ONE)
            .bind(org_id)
            .bind(instance_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let Json(record): Json<InstanceRecord> = row.try_get("record")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn delete_one(&self, org_id: &str, instance_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(DELETE_ONE)
            .bind(org_id)
            .bind(instance_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
