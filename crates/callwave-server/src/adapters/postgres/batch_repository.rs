//! PostgreSQL implementation of BatchRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use callwave::{Batch, BatchRepository, BatchStatus, Call, CounterDelta, DomainError};

/// PostgreSQL implementation of BatchRepository
pub struct PgBatchRepository {
    pool: PgPool,
}

impl PgBatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct BatchRow {
    id: Uuid,
    name: String,
    message: Option<String>,
    total_calls: i32,
    successful_calls: i32,
    failed_calls: i32,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BatchRow> for Batch {
    type Error = DomainError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let status: BatchStatus = row.status.parse().map_err(DomainError::Repository)?;

        Ok(Self {
            id: row.id,
            name: row.name,
            message: row.message,
            total_calls: row.total_calls,
            successful_calls: row.successful_calls,
            failed_calls: row.failed_calls,
            status,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

#[async_trait]
impl BatchRepository for PgBatchRepository {
    async fn create(&self, batch: &Batch, calls: &[Call]) -> Result<Batch, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::Repository(e.to_string()))?;

        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            INSERT INTO batches (id, name, message, total_calls, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(batch.id)
        .bind(&batch.name)
        .bind(&batch.message)
        .bind(batch.total_calls)
        .bind(batch.status.as_str())
        .bind(batch.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        for call in calls {
            sqlx::query(
                r#"
                INSERT INTO calls (id, batch_id, phone_number, reg_no, message, status, version, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(call.id)
            .bind(call.batch_id)
            .bind(&call.phone_number)
            .bind(&call.reg_no)
            .bind(&call.message)
            .bind(call.status.as_str())
            .bind(call.version)
            .bind(call.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::Repository(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::Repository(e.to_string()))?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Batch>, DomainError> {
        let row = sqlx::query_as::<_, BatchRow>("SELECT * FROM batches WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Repository(e.to_string()))?;

        row.map(Batch::try_from).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Batch>, DomainError> {
        let rows = sqlx::query_as::<_, BatchRow>("SELECT * FROM batches ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::Repository(e.to_string()))?;

        rows.into_iter().map(Batch::try_from).collect()
    }

    async fn find_by_status(&self, status: BatchStatus) -> Result<Vec<Batch>, DomainError> {
        let rows = sqlx::query_as::<_, BatchRow>(
            "SELECT * FROM batches WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        rows.into_iter().map(Batch::try_from).collect()
    }

    async fn mark_dispatching(&self, id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE batches SET status = 'dispatching' WHERE id = $1 AND status = 'created'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_counters(&self, id: Uuid, delta: CounterDelta) -> Result<(), DomainError> {
        if delta.is_zero() {
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE batches
            SET successful_calls = successful_calls + $2,
                failed_calls = failed_calls + $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(delta.success)
        .bind(delta.failure)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        Ok(())
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        successful_calls: i32,
        failed_calls: i32,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE batches
            SET status = 'completed', completed_at = NOW(),
                successful_calls = $2, failed_calls = $3
            WHERE id = $1 AND status <> 'completed'
            "#,
        )
        .bind(id)
        .bind(successful_calls)
        .bind(failed_calls)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
