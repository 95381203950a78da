use anyhow::Result;
use serde_json::Value;
use sqlx::Row;
use std::time::Duration;

use crate::domain::notification::{
    CreatedNotification, NotificationType, PendingDelivery, UserNotification,
};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct NotificationService {
    db: Db,
}

impl NotificationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Inserts one notification row, resolving the kind through the type
    /// catalog. Title falls back to the catalog display name when the
    /// payload carries none. Store errors propagate unmodified.
    pub async fn generate(
        &self,
        kind: NotificationType,
        user_id: i64,
        data: &Value,
    ) -> Result<CreatedNotification> {
        let title = data
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(kind.name())
            .to_string();
        let link = data
            .get("link")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let row = sqlx::query(
            "INSERT INTO notifications (type_id, user_id, title, link, data, created_on) \
             VALUES ((SELECT id FROM notification_types WHERE name = $1), $2, $3, $4, $5, now()) \
             RETURNING id, type_id, user_id, created_on",
        )
        .bind(kind.name())
        .bind(user_id)
        .bind(&title)
        .bind(&link)
        .bind(data)
        .fetch_one(self.db.pool())
        .await?;

        Ok(CreatedNotification {
            id: row.get("id"),
            type_id: row.get("type_id"),
            user_id: row.get("user_id"),
            created_on: row.get("created_on"),
        })
    }

    /// Active notifications for one user, newest first, enriched with the
    /// catalog name, icon and color.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<UserNotification>> {
        let rows = sqlx::query(
            "SELECT n.id, n.user_id, n.type_id, n.title, n.link, n.data, \
                    n.created_on, n.read_on, t.name AS type_name, t.icon, t.color \
             FROM notifications n \
             JOIN notification_types t ON t.id = n.type_id \
             WHERE n.user_id = $1 AND n.active \
             ORDER BY n.created_on DESC, n.id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut notifications = Vec::with_capacity(rows.len());
        for row in rows {
            notifications.push(UserNotification {
                id: row.get("id"),
                user_id: row.get("user_id"),
                type_id: row.get("type_id"),
                title: row.get("title"),
                link: row.get("link"),
                data: row.get("data"),
                created_on: row.get("created_on"),
                read_on: row.get("read_on"),
                type_name: row.get("type_name"),
                icon: row.get("icon"),
                color: row.get("color"),
            });
        }

        Ok(notifications)
    }

    /// Claims up to `limit` deliverable rows for this worker. The claim is
    /// a conditional update on `claimed_by`/`claimed_at`; the candidate
    /// select skips rows locked by concurrent claimers, so two workers
    /// never pick the same notification. Claims older than `stale_after`
    /// are treated as abandoned and reclaimed.
    pub async fn claim_pending(
        &self,
        worker_id: &str,
        stale_after: Duration,
        limit: i64,
    ) -> Result<Vec<PendingDelivery>> {
        let rows = sqlx::query(
            "WITH claimed AS ( \
                 UPDATE notifications SET claimed_by = $1, claimed_at = now() \
                 WHERE id IN ( \
                     SELECT n.id FROM notifications n \
                     JOIN users u ON u.id = n.user_id \
                     WHERE n.active \
                       AND n.read_on IS NULL \
                       AND u.email IS NOT NULL AND u.email <> '' \
                       AND (n.claimed_at IS NULL OR n.claimed_at < now() - make_interval(secs => $2)) \
                     ORDER BY n.created_on \
                     LIMIT $3 \
                     FOR UPDATE OF n SKIP LOCKED \
                 ) \
                 RETURNING id, user_id, type_id, title, link, data \
             ) \
             SELECT c.id, c.user_id, c.type_id, c.title, c.link, c.data, u.email, u.login \
             FROM claimed c \
             JOIN users u ON u.id = c.user_id \
             ORDER BY c.id",
        )
        .bind(worker_id)
        .bind(stale_after.as_secs_f64())
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut pending = Vec::with_capacity(rows.len());
        for row in rows {
            pending.push(PendingDelivery {
                id: row.get("id"),
                user_id: row.get("user_id"),
                type_id: row.get("type_id"),
                title: row.get("title"),
                link: row.get("link"),
                data: row.get("data"),
                email: row.get("email"),
                login: row.get("login"),
            });
        }

        Ok(pending)
    }

    /// Marks one row delivered. `read_on` moves from null to now exactly
    /// once; a row that was already delivered is left untouched.
    pub async fn mark_delivered(&self, notification_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET read_on = now(), claimed_by = NULL, claimed_at = NULL \
             WHERE id = $1 AND read_on IS NULL",
        )
        .bind(notification_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns a failed row to the backlog so the next cycle retries it.
    pub async fn release_claim(&self, notification_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE notifications \
             SET claimed_by = NULL, claimed_at = NULL \
             WHERE id = $1 AND read_on IS NULL",
        )
        .bind(notification_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Soft-deletes delivered notifications older than the retention
    /// window. Unread rows are never touched regardless of age.
    pub async fn deactivate_old_read(&self, retention_days: i32) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET active = false \
             WHERE active \
               AND read_on IS NOT NULL \
               AND created_on < now() - make_interval(days => $1)",
        )
        .bind(retention_days)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }
}
