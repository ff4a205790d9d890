//! PostgreSQL implementation of CallRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use callwave::{Call, CallRepository, CallStatus, DomainError};

/// PostgreSQL implementation of CallRepository
pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct CallRow {
    id: Uuid,
    batch_id: Uuid,
    phone_number: String,
    reg_no: Option<String>,
    message: Option<String>,
    external_call_id: Option<String>,
    status: String,
    version: i64,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    live_transcript: Option<String>,
    final_transcript: Option<String>,
    recording_url: Option<String>,
    duration_seconds: Option<i32>,
    error_message: Option<String>,
}

impl TryFrom<CallRow> for Call {
    type Error = DomainError;

    fn try_from(row: CallRow) -> Result<Self, Self::Error> {
        let status: CallStatus = row.status.parse().map_err(DomainError::Repository)?;

        Ok(Self {
            id: row.id,
            batch_id: row.batch_id,
            phone_number: row.phone_number,
            reg_no: row.reg_no,
            message: row.message,
            external_call_id: row.external_call_id,
            status,
            version: row.version,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            live_transcript: row.live_transcript,
            final_transcript: row.final_transcript,
            recording_url: row.recording_url,
            duration_seconds: row.duration_seconds,
            error_message: row.error_message,
        })
    }
}

fn into_calls(rows: Vec<CallRow>) -> Result<Vec<Call>, DomainError> {
    rows.into_iter().map(Call::try_from).collect()
}

fn status_names(statuses: &[CallStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl CallRepository for PgCallRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, DomainError> {
        let row = sqlx::query_as::<_, CallRow>("SELECT * FROM calls WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Repository(e.to_string()))?;

        row.map(Call::try_from).transpose()
    }

    async fn find_by_external_id(
        &self,
        external_call_id: &str,
    ) -> Result<Option<Call>, DomainError> {
        let row =
            sqlx::query_as::<_, CallRow>("SELECT * FROM calls WHERE external_call_id = $1")
                .bind(external_call_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::Repository(e.to_string()))?;

        row.map(Call::try_from).transpose()
    }

    async fn find_latest_open_by_reg_no(&self, reg_no: &str) -> Result<Option<Call>, DomainError> {
        let row = sqlx::query_as::<_, CallRow>(
            r#"
            SELECT * FROM calls
            WHERE reg_no = $1 AND status IN ('queued', 'ringing', 'active')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(reg_no)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        row.map(Call::try_from).transpose()
    }

    async fn find_by_batch(&self, batch_id: Uuid) -> Result<Vec<Call>, DomainError> {
        let rows = sqlx::query_as::<_, CallRow>(
            "SELECT * FROM calls WHERE batch_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        into_calls(rows)
    }

    async fn find_by_batch_and_status(
        &self,
        batch_id: Uuid,
        statuses: &[CallStatus],
    ) -> Result<Vec<Call>, DomainError> {
        let rows = sqlx::query_as::<_, CallRow>(
            r#"
            SELECT * FROM calls
            WHERE batch_id = $1 AND status = ANY($2)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(batch_id)
        .bind(status_names(statuses))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        into_calls(rows)
    }

    async fn find_stale(
        &self,
        batch_id: Option<Uuid>,
        statuses: &[CallStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Call>, DomainError> {
        let rows = sqlx::query_as::<_, CallRow>(
            r#"
            SELECT * FROM calls
            WHERE status = ANY($1)
              AND COALESCE(started_at, created_at) < $2
              AND ($3::uuid IS NULL OR batch_id = $3)
            ORDER BY created_at ASC
            "#,
        )
        .bind(status_names(statuses))
        .bind(older_than)
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        into_calls(rows)
    }

    async fn update_if_version(&self, call: &Call) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE calls
            SET external_call_id = $3, status = $4, started_at = $5, completed_at = $6,
                live_transcript = $7, final_transcript = $8, recording_url = $9,
                duration_seconds = $10, error_message = $11, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(call.id)
        .bind(call.version)
        .bind(&call.external_call_id)
        .bind(call.status.as_str())
        .bind(call.started_at)
        .bind(call.completed_at)
        .bind(&call.live_transcript)
        .bind(&call.final_transcript)
        .bind(&call.recording_url)
        .bind(call.duration_seconds)
        .bind(&call.error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}
