use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::executions::model::{
    ExecutionStatus, JobExecution, NewJobExecution, ResultClassification,
};
use crate::executions::store::ExecutionStore;

#[derive(Clone)]
pub struct ExecutionsRepo {
    pool: PgPool,
}

impl ExecutionsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionStore for ExecutionsRepo {
    async fn create_if_absent(
        &self,
        new: NewJobExecution,
    ) -> anyhow::Result<Option<JobExecution>> {
        // request_id carries a UNIQUE constraint; ON CONFLICT DO NOTHING
        // makes redelivered events a no-op.
        let row = sqlx::query_as::<_, JobExecution>(
            r#"
            INSERT INTO job_executions (
                id, request_id, target_type, resource_type, resource_id,
                form_data, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (request_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.request_id)
        .bind(new.target_type.as_str())
        .bind(new.resource_type.map(|r| r.as_str()))
        .bind(&new.resource_id)
        .bind(&new.form_data)
        .bind(ExecutionStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<JobExecution>> {
        let row = sqlx::query_as::<_, JobExecution>("SELECT * FROM job_executions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_by_request(&self, request_id: Uuid) -> anyhow::Result<Option<JobExecution>> {
        let row = sqlx::query_as::<_, JobExecution>(
            "SELECT * FROM job_executions WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(
        &self,
        status: Option<&str>,
        limit: i64,
        cursor: Option<(DateTime<Utc>, Uuid)>,
    ) -> anyhow::Result<Vec<JobExecution>> {
        let limit = limit.clamp(1, 500);

        let rows = match (status, cursor) {
            (Some(st), Some((ca, cid))) => {
                sqlx::query_as::<_, JobExecution>(
                    r#"
                    SELECT * FROM job_executions
                    WHERE status = $1 AND (created_at, id) < ($2, $3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(st)
                .bind(ca)
                .bind(cid)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (Some(st), None) => {
                sqlx::query_as::<_, JobExecution>(
                    r#"
                    SELECT * FROM job_executions
                    WHERE status = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                    "#,
                )
                .bind(st)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (None, Some((ca, cid))) => {
                sqlx::query_as::<_, JobExecution>(
                    r#"
                    SELECT * FROM job_executions
                    WHERE (created_at, id) < ($1, $2)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $3
                    "#,
                )
                .bind(ca)
                .bind(cid)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (None, None) => {
                sqlx::query_as::<_, JobExecution>(
                    r#"
                    SELECT * FROM job_executions
                    ORDER BY created_at DESC, id DESC
                    LIMIT $1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows)
    }

    async fn fetch_open(&self, limit: i64) -> anyhow::Result<Vec<JobExecution>> {
        let rows = sqlx::query_as::<_, JobExecution>(
            r#"
            SELECT * FROM job_executions
            WHERE status IN ('pending', 'running')
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_running(
        &self,
        id: Uuid,
        backend_execution_id: &str,
        launch_payload: &Value,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE job_executions
            SET status = 'running',
                backend_execution_id = $2,
                launch_payload = $3,
                dispatched_at = now(),
                last_launch_error = NULL,
                error_message = NULL
            WHERE id = $1
              AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(backend_execution_id)
        .bind(launch_payload)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }

    async fn record_launch_failure(
        &self,
        id: Uuid,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE job_executions
            SET launch_attempts = launch_attempts + 1,
                next_launch_attempt_at = $2,
                last_launch_error = $3
            WHERE id = $1
              AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(next_attempt_at)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_poll(
        &self,
        id: Uuid,
        raw_status: Option<&str>,
        response: Option<&Value>,
    ) -> anyhow::Result<Option<i32>> {
        let attempts = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE job_executions
            SET polling_attempts = polling_attempts + 1,
                last_polled_at = now(),
                raw_status = COALESCE($2, raw_status),
                last_response = COALESCE($3, last_response)
            WHERE id = $1
              AND status = 'running'
            RETURNING polling_attempts
            "#,
        )
        .bind(id)
        .bind(raw_status)
        .bind(response)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempts)
    }

    async fn mark_succeeded(
        &self,
        id: Uuid,
        raw_status: &str,
        classification: Option<ResultClassification>,
        response: Option<&Value>,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE job_executions
            SET status = 'succeeded',
                raw_status = $2,
                result_classification = $3,
                last_response = COALESCE($4, last_response),
                completed_at = now(),
                error_message = NULL
            WHERE id = $1
              AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(raw_status)
        .bind(classification.map(|c| c.as_str()))
        .bind(response)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        raw_status: Option<&str>,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE job_executions
            SET status = 'failed',
                error_message = $2,
                raw_status = COALESCE($3, raw_status),
                completed_at = now()
            WHERE id = $1
              AND status IN ('pending', 'running')
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(raw_status)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
