//! PostgreSQL implementation of BuildStore.

use async_trait::async_trait;
use kiln_core::build::{Build, BuildStatus, TriggerKind};
use kiln_core::ids::BuildId;
use kiln_core::ports::BuildStore;
use kiln_core::{Error, Result};
use sqlx::{PgPool, Row};

const COLUMNS: &str = "id, status, trigger, triggered_by, start_time, end_time, logs";

/// PostgreSQL implementation of BuildStore.
pub struct PgBuildStore {
    pool: PgPool,
}

impl PgBuildStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_build(r: &sqlx::postgres::PgRow) -> Result<Build> {
        let status: BuildStatus = r.get::<String, _>("status").parse()?;
        let trigger: TriggerKind = r.get::<String, _>("trigger").parse()?;

        Ok(Build {
            id: BuildId::from_uuid(r.get::<uuid::Uuid, _>("id")),
            status,
            trigger,
            start_time: r.get("start_time"),
            end_time: r.get("end_time"),
            logs: r.get("logs"),
            triggered_by: r.get("triggered_by"),
        })
    }
}

#[async_trait]
impl BuildStore for PgBuildStore {
    async fn create(&self, build: &Build) -> Result<Build> {
        sqlx::query(
            r#"INSERT INTO builds (id, status, trigger, triggered_by, start_time, end_time, logs)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(build.id.as_uuid())
        .bind(build.status.as_str())
        .bind(build.trigger.as_str())
        .bind(&build.triggered_by)
        .bind(build.start_time)
        .bind(build.end_time)
        .bind(&build.logs)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(build.clone())
    }

    /// Upsert, so a build first recorded by another backend is still saved.
    async fn save(&self, build: &Build) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO builds (id, status, trigger, triggered_by, start_time, end_time, logs)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (id) DO UPDATE
               SET status = EXCLUDED.status,
                   end_time = EXCLUDED.end_time,
                   logs = EXCLUDED.logs"#,
        )
        .bind(build.id.as_uuid())
        .bind(build.status.as_str())
        .bind(build.trigger.as_str())
        .bind(&build.triggered_by)
        .bind(build.start_time)
        .bind(build.end_time)
        .bind(&build.logs)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, id: BuildId) -> Result<Option<Build>> {
        let row = sqlx::query(&format!("SELECT {} FROM builds WHERE id = $1", COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        row.as_ref().map(Self::row_to_build).transpose()
    }

    async fn list(&self, limit: u32) -> Result<Vec<Build>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM builds ORDER BY start_time DESC LIMIT $1",
            COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        rows.iter().map(Self::row_to_build).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
