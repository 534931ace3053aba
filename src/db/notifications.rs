use chrono::Utc;
use serde::Serialize;
use sqlx::{Pool, Sqlite, Transaction};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::{NewNotification, Notification, OutboxEntry};

const OUTBOX_COLUMNS: &str = "id, recipient_email, title, message, kind, booking_id, lesson_id, \
     attempts, last_error, delivered_at, created_at";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Queues a notification inside the caller's transaction. Nothing becomes visible to
/// the recipient until the transaction commits and the outbox is dispatched.
pub async fn enqueue_notification(
    tx: &mut Transaction<'_, Sqlite>,
    notification: &NewNotification,
) -> Result<i64, AppError> {
    let res = sqlx::query(
        "INSERT INTO notification_outbox
         (recipient_email, title, message, kind, booking_id, lesson_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&notification.recipient_email)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.kind)
    .bind(notification.booking_id)
    .bind(notification.lesson_id)
    .bind(Utc::now().naive_utc())
    .execute(&mut **tx)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn dispatch_pending(pool: &Pool<Sqlite>, batch: i64) -> Result<DispatchReport, AppError> {
    let query = format!(
        "SELECT {} FROM notification_outbox WHERE delivered_at IS NULL ORDER BY id LIMIT ?",
        OUTBOX_COLUMNS
    );
    let pending = sqlx::query_as::<_, OutboxEntry>(&query)
        .bind(batch)
        .fetch_all(pool)
        .await?;

    let mut report = DispatchReport::default();

    for entry in pending {
        match deliver(pool, &entry).await {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                warn!(outbox_id = entry.id, error = %err, "Notification delivery failed");
                report.failed += 1;

                sqlx::query(
                    "UPDATE notification_outbox SET attempts = attempts + 1, last_error = ? WHERE id = ?",
                )
                .bind(err.to_string())
                .bind(entry.id)
                .execute(pool)
                .await?;
            }
        }
    }

    if report.delivered > 0 || report.failed > 0 {
        info!(
            delivered = report.delivered,
            failed = report.failed,
            "Outbox dispatch finished"
        );
    }

    Ok(report)
}

async fn deliver(pool: &Pool<Sqlite>, entry: &OutboxEntry) -> Result<(), AppError> {
    let mut tx = super::begin_write(pool).await?;

    sqlx::query(
        "INSERT OR IGNORE INTO notifications
         (outbox_id, user_email, title, message, kind, booking_id, lesson_id, read, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, FALSE, ?)",
    )
    .bind(entry.id)
    .bind(&entry.recipient_email)
    .bind(&entry.title)
    .bind(&entry.message)
    .bind(entry.kind)
    .bind(entry.booking_id)
    .bind(entry.lesson_id)
    .bind(entry.created_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE notification_outbox SET attempts = attempts + 1, delivered_at = ?, last_error = NULL WHERE id = ?",
    )
    .bind(Utc::now().naive_utc())
    .bind(entry.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn list_notifications(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Vec<Notification>, AppError> {
    info!("Listing notifications");

    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT id, outbox_id, user_email, title, message, kind, booking_id, lesson_id, read, created_at
         FROM notifications WHERE user_email = ?
         ORDER BY created_at DESC, id DESC",
    )
    .bind(email)
    .fetch_all(pool)
    .await?;

    Ok(notifications)
}

/// Returns false when the notification does not exist or belongs to someone else.
#[instrument(skip(pool))]
pub async fn mark_notification_read(
    pool: &Pool<Sqlite>,
    id: i64,
    email: &str,
) -> Result<bool, AppError> {
    info!("Marking notification as read");

    let res = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = ? AND user_email = ?")
        .bind(id)
        .bind(email)
        .execute(pool)
        .await?;

    Ok(res.rows_affected() > 0)
}

#[instrument(skip(pool))]
pub async fn unread_count(pool: &Pool<Sqlite>, email: &str) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_email = ? AND read = FALSE",
    )
    .bind(email)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

#[instrument(skip(pool))]
pub async fn list_undelivered(pool: &Pool<Sqlite>) -> Result<Vec<OutboxEntry>, AppError> {
    info!("Listing undelivered outbox entries");
    let query = format!(
        "SELECT {} FROM notification_outbox WHERE delivered_at IS NULL ORDER BY id",
        OUTBOX_COLUMNS
    );

    let entries = sqlx::query_as::<_, OutboxEntry>(&query)
        .fetch_all(pool)
        .await?;

    Ok(entries)
}
