use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{Conversation, Message};

#[instrument(skip(pool, message))]
pub async fn send_message(
    pool: &Pool<Sqlite>,
    sender_email: &str,
    receiver_email: &str,
    message: &str,
    message_type: &str,
) -> Result<Message, AppError> {
    info!("Sending chat message");

    let message = sqlx::query_as::<_, Message>(
        "INSERT INTO messages (sender_email, receiver_email, message, message_type, read, created_at)
         VALUES (?, ?, ?, ?, FALSE, ?)
         RETURNING id, sender_email, receiver_email, message, message_type, read, created_at",
    )
    .bind(sender_email)
    .bind(receiver_email)
    .bind(message)
    .bind(message_type)
    .bind(Utc::now().naive_utc())
    .fetch_one(pool)
    .await?;

    Ok(message)
}

/// One row per counterpart carrying the latest message exchanged with them.
#[instrument(skip(pool))]
pub async fn list_conversations(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Vec<Conversation>, AppError> {
    info!("Listing conversations");

    let conversations = sqlx::query_as::<_, Conversation>(
        "SELECT partner_email, message AS last_message, created_at AS last_message_time
         FROM (
             SELECT CASE WHEN sender_email = ?1 THEN receiver_email ELSE sender_email END AS partner_email,
                    message, created_at, id,
                    ROW_NUMBER() OVER (
                        PARTITION BY CASE WHEN sender_email = ?1 THEN receiver_email ELSE sender_email END
                        ORDER BY created_at DESC, id DESC
                    ) AS position
             FROM messages
             WHERE sender_email = ?1 OR receiver_email = ?1
         )
         WHERE position = 1
         ORDER BY last_message_time DESC, id DESC",
    )
    .bind(email)
    .fetch_all(pool)
    .await?;

    Ok(conversations)
}

/// Messages between the two parties, oldest first. Messages received by `email`
/// are marked read.
#[instrument(skip(pool))]
pub async fn get_conversation(
    pool: &Pool<Sqlite>,
    email: &str,
    partner_email: &str,
) -> Result<Vec<Message>, AppError> {
    info!("Fetching conversation");

    sqlx::query("UPDATE messages SET read = TRUE WHERE receiver_email = ? AND sender_email = ?")
        .bind(email)
        .bind(partner_email)
        .execute(pool)
        .await?;

    let messages = sqlx::query_as::<_, Message>(
        "SELECT id, sender_email, receiver_email, message, message_type, read, created_at
         FROM messages
         WHERE (sender_email = ?1 AND receiver_email = ?2) OR (sender_email = ?2 AND receiver_email = ?1)
         ORDER BY created_at ASC, id ASC",
    )
    .bind(email)
    .bind(partner_email)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}
