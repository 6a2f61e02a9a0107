// SQLite NotificationSink: persists notifications for the dashboard bell

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use mailqueue_core::domain::{Notification, NotificationLevel, NotificationType};
use mailqueue_core::error::{AppError, Result};
use mailqueue_core::port::{NotificationSink, NotifyError, TimeProvider};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

/// Notification as stored, with its recipient and insertion time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNotification {
    pub id: i64,
    pub user_id: String,
    pub created_at: i64,
    pub notification: Notification,
}

pub struct SqliteNotificationSink {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteNotificationSink {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Most recent notifications first, optionally for one user
    pub async fn recent(
        &self,
        user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredNotification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, type, title, message, level, created_at
            FROM notifications
            WHERE (?1 IS NULL OR user_id = ?1)
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(NotificationRow::into_stored).collect()
    }
}

#[async_trait]
impl NotificationSink for SqliteNotificationSink {
    async fn publish(
        &self,
        user_id: &str,
        notification: Notification,
    ) -> std::result::Result<(), NotifyError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, type, title, message, level, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(notification.kind.to_string())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.level.to_string())
        .bind(self.time_provider.now_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| NotifyError(map_sqlx_error(e).to_string()))?;

        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    user_id: String,
    #[sqlx(rename = "type")]
    kind: String,
    title: String,
    message: String,
    level: String,
    created_at: i64,
}

impl NotificationRow {
    fn into_stored(self) -> Result<StoredNotification> {
        let kind = NotificationType::from_str(&self.kind).map_err(AppError::from)?;
        let level = NotificationLevel::from_str(&self.level).map_err(AppError::from)?;

        Ok(StoredNotification {
            id: self.id,
            user_id: self.user_id,
            created_at: self.created_at,
            notification: Notification {
                kind,
                title: self.title,
                message: self.message,
                level,
            },
        })
    }
}
