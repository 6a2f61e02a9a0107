// SQLite JobStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use mailqueue_core::domain::{EmailJob, JobMetadata, JobStatus, Priority};
use mailqueue_core::error::{AppError, Result};
use mailqueue_core::port::JobStore;
use sqlx::SqlitePool;
use std::str::FromStr;

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &EmailJob) -> Result<()> {
        let metadata = job.metadata.as_ref().map(|m| m.as_value().to_string());

        sqlx::query(
            r#"
            INSERT INTO email_jobs (
                id, recipient, subject, content, priority, status,
                max_retries, current_retries, created_at, scheduled_at,
                processed_at, error_message, message_id, metadata, cancel_requested
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.recipient)
        .bind(&job.subject)
        .bind(&job.content)
        .bind(job.priority.rank())
        .bind(job.status.to_string())
        .bind(job.max_retries)
        .bind(job.current_retries)
        .bind(job.created_at)
        .bind(job.scheduled_at)
        .bind(job.processed_at)
        .bind(&job.error_message)
        .bind(&job.message_id)
        .bind(metadata)
        .bind(job.cancel_requested)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<EmailJob>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM email_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn list_eligible(&self, now_millis: i64, limit: usize) -> Result<Vec<EmailJob>> {
        // `scheduled_at IS NOT NULL` sorts unscheduled jobs first
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM email_jobs
            WHERE status = 'pending'
              AND (scheduled_at IS NULL OR scheduled_at <= ?)
            ORDER BY priority DESC,
                     scheduled_at IS NOT NULL,
                     scheduled_at ASC,
                     created_at ASC,
                     id ASC
            LIMIT ?
            "#,
        )
        .bind(now_millis)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn transition(&self, job: &EmailJob, expected: JobStatus) -> Result<bool> {
        if expected.is_final() {
            return Ok(false);
        }

        // Compare-and-set on (status, cancel_requested); leaving processing clears the flag
        let status = job.status.to_string();
        let result = sqlx::query(
            r#"
            UPDATE email_jobs
            SET status = ?1, current_retries = ?2, scheduled_at = ?3,
                processed_at = ?4, error_message = ?5, message_id = ?6,
                cancel_requested = CASE WHEN ?1 = 'processing' THEN cancel_requested ELSE 0 END
            WHERE id = ?7 AND status = ?8 AND cancel_requested = ?9
            "#,
        )
        .bind(&status)
        .bind(job.current_retries)
        .bind(job.scheduled_at)
        .bind(job.processed_at)
        .bind(&job.error_message)
        .bind(&job.message_id)
        .bind(&job.id)
        .bind(expected.to_string())
        .bind(job.cancel_requested)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn cancel(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE email_jobs
            SET status = 'cancelled'
            WHERE id = ? AND status IN ('pending', 'failed')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn request_cancel(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE email_jobs
            SET cancel_requested = 1
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn purge(&self, cutoff_millis: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM email_jobs
            WHERE status IN ('sent', 'failed', 'cancelled')
              AND COALESCE(processed_at, scheduled_at, created_at) < ?
            "#,
        )
        .bind(cutoff_millis)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count_by_status(&self) -> Result<Vec<(JobStatus, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM email_jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(status, count)| {
                JobStatus::from_str(&status)
                    .map(|s| (s, count))
                    .map_err(AppError::from)
            })
            .collect()
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<EmailJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM email_jobs
            WHERE status = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    recipient: String,
    subject: String,
    content: String,
    priority: i32,
    status: String,
    cancel_requested: bool,
    max_retries: i32,
    current_retries: i32,
    created_at: i64,
    scheduled_at: Option<i64>,
    processed_at: Option<i64>,
    error_message: Option<String>,
    message_id: Option<String>,
    metadata: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<EmailJob> {
        let status = JobStatus::from_str(&self.status)?;
        let priority = Priority::from_rank(self.priority).unwrap_or_default();
        let metadata = self
            .metadata
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()?
            .map(JobMetadata::new);

        Ok(EmailJob {
            id: self.id,
            recipient: self.recipient,
            subject: self.subject,
            content: self.content,
            priority,
            status,
            cancel_requested: self.cancel_requested,
            max_retries: self.max_retries,
            current_retries: self.current_retries,
            created_at: self.created_at,
            scheduled_at: self.scheduled_at,
            processed_at: self.processed_at,
            error_message: self.error_message,
            message_id: self.message_id,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    const NOW: i64 = 1_700_000_000_000;

    async fn setup_test_store() -> SqliteJobStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteJobStore::new(pool)
    }

    fn job(id: &str, created_at: i64) -> EmailJob {
        EmailJob::new(id, created_at, format!("{}@example.com", id), "Subject", "Body")
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = setup_test_store().await;

        let mut original = job("a", NOW);
        original.priority = Priority::High;
        original.scheduled_at = Some(NOW + 1_000);
        original.metadata = Some(JobMetadata::new(
            serde_json::json!({"invoice_id": "inv-1", "user_id": "u-1"}),
        ));
        store.insert(&original).await.unwrap();

        let found = store.find_by_id("a").await.unwrap().unwrap();
        assert_eq!(found, original);
        assert!(store.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let store = setup_test_store().await;
        store.insert(&job("a", NOW)).await.unwrap();

        let err = store.insert(&job("a", NOW)).await.unwrap_err();
        assert!(err.to_string().contains("Unique constraint"));
    }

    #[tokio::test]
    async fn test_retry_count_cannot_exceed_budget() {
        let store = setup_test_store().await;
        let mut bad = job("a", NOW);
        bad.current_retries = bad.max_retries + 1;
        assert!(store.insert(&bad).await.is_err());
    }

    #[tokio::test]
    async fn test_list_eligible_order_and_due_filter() {
        let store = setup_test_store().await;

        let mut low = job("low", NOW - 5_000);
        low.priority = Priority::Low;
        let mut high_scheduled = job("high-scheduled", NOW - 4_000);
        high_scheduled.priority = Priority::High;
        high_scheduled.scheduled_at = Some(NOW - 100);
        let mut high_unscheduled = job("high-unscheduled", NOW - 1_000);
        high_unscheduled.priority = Priority::High;
        let normal_old = job("normal-old", NOW - 9_000);
        let normal_new = job("normal-new", NOW - 2_000);
        let mut future = job("future", NOW - 9_000);
        future.priority = Priority::High;
        future.scheduled_at = Some(NOW + 60_000);
        let mut sent = job("sent", NOW - 9_000);
        sent.status = JobStatus::Sent;

        for j in [
            &low,
            &high_scheduled,
            &high_unscheduled,
            &normal_old,
            &normal_new,
            &future,
            &sent,
        ] {
            store.insert(j).await.unwrap();
        }

        let ids: Vec<String> = store
            .list_eligible(NOW, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                "high-unscheduled",
                "high-scheduled",
                "normal-old",
                "normal-new",
                "low"
            ]
        );

        assert_eq!(store.list_eligible(NOW, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = setup_test_store().await;
        store.insert(&job("a", NOW)).await.unwrap();

        let mut claimed = store.find_by_id("a").await.unwrap().unwrap();
        claimed.start(NOW).unwrap();
        assert!(store.transition(&claimed, JobStatus::Pending).await.unwrap());

        // a second claim from a stale read loses
        let mut stale = job("a", NOW);
        stale.start(NOW).unwrap();
        assert!(!store.transition(&stale, JobStatus::Pending).await.unwrap());

        claimed.mark_sent(NOW + 10, "msg-1").unwrap();
        assert!(store
            .transition(&claimed, JobStatus::Processing)
            .await
            .unwrap());

        let stored = store.find_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Sent);
        assert_eq!(stored.message_id.as_deref(), Some("msg-1"));
        assert_eq!(stored.processed_at, Some(NOW + 10));

        // nothing leaves a final status
        assert!(!store.transition(&stored, JobStatus::Sent).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_only_pending_or_failed() {
        let store = setup_test_store().await;
        let mut processing = job("processing", NOW);
        processing.status = JobStatus::Processing;
        let mut failed = job("failed", NOW);
        failed.status = JobStatus::Failed;
        store.insert(&job("pending", NOW)).await.unwrap();
        store.insert(&processing).await.unwrap();
        store.insert(&failed).await.unwrap();

        assert!(store.cancel("pending").await.unwrap());
        assert!(store.cancel("failed").await.unwrap());
        assert!(!store.cancel("processing").await.unwrap());
        assert!(!store.cancel("pending").await.unwrap());
        assert!(!store.cancel("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_request_blocks_stale_commit() {
        let store = setup_test_store().await;
        store.insert(&job("a", NOW)).await.unwrap();
        assert!(!store.request_cancel("a").await.unwrap());

        let mut claimed = store.find_by_id("a").await.unwrap().unwrap();
        claimed.start(NOW).unwrap();
        assert!(store.transition(&claimed, JobStatus::Pending).await.unwrap());
        assert!(store.request_cancel("a").await.unwrap());

        // the dispatcher's copy predates the request
        claimed.schedule_retry(NOW, 60_000, "[network] reset").unwrap();
        assert!(!store
            .transition(&claimed, JobStatus::Processing)
            .await
            .unwrap());

        let mut current = store.find_by_id("a").await.unwrap().unwrap();
        assert!(current.cancel_requested);
        current.fail(NOW, "[network] reset (cancelled during send)").unwrap();
        assert!(store
            .transition(&current, JobStatus::Processing)
            .await
            .unwrap());
        assert!(store.cancel("a").await.unwrap());

        let stored = store.find_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert!(!stored.cancel_requested);
    }

    #[tokio::test]
    async fn test_purge_uses_reference_time_and_status() {
        let store = setup_test_store().await;
        let cutoff = NOW - 1_000;

        let mut old_sent = job("old-sent", NOW - 50_000);
        old_sent.status = JobStatus::Sent;
        old_sent.processed_at = Some(NOW - 40_000);
        // created long ago but processed recently
        let mut recent_failed = job("recent-failed", NOW - 50_000);
        recent_failed.status = JobStatus::Failed;
        recent_failed.processed_at = Some(NOW);
        let mut old_cancelled = job("old-cancelled", NOW - 50_000);
        old_cancelled.status = JobStatus::Cancelled;
        let old_pending = job("old-pending", NOW - 50_000);

        for j in [&old_sent, &recent_failed, &old_cancelled, &old_pending] {
            store.insert(j).await.unwrap();
        }

        assert_eq!(store.purge(cutoff).await.unwrap(), 2);
        assert!(store.find_by_id("old-sent").await.unwrap().is_none());
        assert!(store.find_by_id("old-cancelled").await.unwrap().is_none());
        assert!(store.find_by_id("recent-failed").await.unwrap().is_some());
        assert!(store.find_by_id("old-pending").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let store = setup_test_store().await;
        let mut sent = job("s", NOW);
        sent.status = JobStatus::Sent;
        store.insert(&job("p1", NOW)).await.unwrap();
        store.insert(&job("p2", NOW)).await.unwrap();
        store.insert(&sent).await.unwrap();

        let mut counts = store.count_by_status().await.unwrap();
        counts.sort_by_key(|(s, _)| s.to_string());
        assert_eq!(
            counts,
            vec![(JobStatus::Pending, 2), (JobStatus::Sent, 1)]
        );
    }
}
