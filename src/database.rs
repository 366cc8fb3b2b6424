#[cfg(feature = "database")]
use async_trait::async_trait;
#[cfg(feature = "database")]
use chrono::{DateTime, Utc};
#[cfg(feature = "database")]
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Row, SqlitePool};
#[cfg(feature = "database")]
use tracing::info;

#[cfg(feature = "database")]
use crate::config::DatabaseConfig;
#[cfg(feature = "database")]
use crate::requests::{FabricationRequest, RequestId, RequestStore, Stage, StoreError};

#[cfg(feature = "database")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[cfg(feature = "database")]
/// SQLite-backed request store
///
/// The full record is kept as a JSON payload; `status`, `requested_at` and
/// `version` are broken out so stage queries and compare-and-swap run in SQL.
pub struct SqliteRequestStore {
    pool: SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteRequestStore {
    /// Open (and create if needed) the database, running migrations when asked
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let in_memory = config.url.contains(":memory:");
        if !in_memory && !sqlx::Sqlite::database_exists(&config.url).await? {
            info!("Creating database at {}", config.url);
            sqlx::Sqlite::create_database(&config.url).await?;
        }

        // Every in-memory connection is its own database
        let max_connections = if in_memory { 1 } else { config.max_connections.max(1) };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&config.url)
            .await?;

        if config.auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    /// Get database pool for queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }

    fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<FabricationRequest, StoreError> {
        let payload: String = row.try_get("payload")?;
        let request: FabricationRequest = serde_json::from_str(&payload)?;
        request
            .check_invariants()
            .map_err(|reason| StoreError::Corrupt { reason })?;
        Ok(request)
    }
}

#[cfg(feature = "database")]
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(feature = "database")]
#[async_trait]
impl RequestStore for SqliteRequestStore {
    async fn insert(&self, request: FabricationRequest) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&request)?;
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO fabrication_requests (id, status, requested_at, version, payload)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(request.id.to_string())
        .bind(request.status.as_str())
        .bind(timestamp(&request.requested_at))
        .bind(request.version as i64)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(request.id));
        }
        Ok(())
    }

    async fn get(&self, id: RequestId) -> Result<Option<FabricationRequest>, StoreError> {
        let row = sqlx::query("SELECT payload FROM fabrication_requests WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn list_by_stage(&self, stage: Stage) -> Result<Vec<FabricationRequest>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT payload
            FROM fabrication_requests
            WHERE status = ?1
            ORDER BY requested_at ASC, id ASC
            "#,
        )
        .bind(stage.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::decode).collect()
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        updated: FabricationRequest,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&updated)?;
        let result = sqlx::query(
            r#"
            UPDATE fabrication_requests
            SET status = ?1, version = ?2, payload = ?3
            WHERE id = ?4 AND version = ?5
            "#,
        )
        .bind(updated.status.as_str())
        .bind(updated.version as i64)
        .bind(payload)
        .bind(updated.id.to_string())
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let found: Option<i64> =
            sqlx::query_scalar("SELECT version FROM fabrication_requests WHERE id = ?1")
                .bind(updated.id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        match found {
            None => Err(StoreError::NotFound(updated.id)),
            Some(found) => Err(StoreError::VersionConflict {
                id: updated.id,
                expected: expected_version,
                found: found as u64,
            }),
        }
    }
}
