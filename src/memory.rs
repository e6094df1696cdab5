//! Bounded per-user conversation memory.
//!
//! Conversations are keyed by `(user_id, conversation_key)` and created
//! lazily on first append. Messages are strictly append-only and read
//! back in chronological order; only the most recent window is ever
//! rendered into a prompt.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{Role, StoredMessage};

/// Resolve (or lazily create) the conversation row.
pub async fn ensure_conversation(
    pool: &SqlitePool,
    user_id: i64,
    conversation_key: &str,
) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO conversations (user_id, conversation_key, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT(user_id, conversation_key) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(conversation_key)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;

    let (id,): (i64,) = sqlx::query_as(
        "SELECT id FROM conversations WHERE user_id = ? AND conversation_key = ?",
    )
    .bind(user_id)
    .bind(conversation_key)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn append_message(
    pool: &SqlitePool,
    conversation_id: i64,
    role: Role,
    content: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO conversation_messages (conversation_id, role, content, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(conversation_id)
    .bind(role.as_str())
    .bind(content)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

/// The most recent `limit` messages, oldest first.
pub async fn load_recent(
    pool: &SqlitePool,
    conversation_id: i64,
    limit: i64,
) -> Result<Vec<StoredMessage>> {
    let rows: Vec<(String, String, i64)> = sqlx::query_as(
        r#"
        SELECT role, content, created_at FROM (
            SELECT id, role, content, created_at
            FROM conversation_messages
            WHERE conversation_id = ?
            ORDER BY id DESC
            LIMIT ?
        )
        ORDER BY id ASC
        "#,
    )
    .bind(conversation_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(role, content, created_at)| StoredMessage {
            role: Role::from_db(&role),
            content,
            created_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn conversation_is_created_once() {
        let pool = test_pool().await;
        let a = ensure_conversation(&pool, 1, "default").await.unwrap();
        let b = ensure_conversation(&pool, 1, "default").await.unwrap();
        assert_eq!(a, b);

        let other = ensure_conversation(&pool, 1, "support").await.unwrap();
        assert_ne!(a, other);
    }

    #[tokio::test]
    async fn recent_messages_windowed_in_order() {
        let pool = test_pool().await;
        let conversation = ensure_conversation(&pool, 1, "default").await.unwrap();

        for i in 0..5 {
            append_message(&pool, conversation, Role::User, &format!("soru {}", i))
                .await
                .unwrap();
            append_message(&pool, conversation, Role::Assistant, &format!("cevap {}", i))
                .await
                .unwrap();
        }

        let recent = load_recent(&pool, conversation, 4).await.unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].content, "soru 3");
        assert_eq!(recent[0].role, Role::User);
        assert_eq!(recent[3].content, "cevap 4");
        assert_eq!(recent[3].role, Role::Assistant);
    }

    #[tokio::test]
    async fn empty_history_is_empty() {
        let pool = test_pool().await;
        let conversation = ensure_conversation(&pool, 9, "default").await.unwrap();
        assert!(load_recent(&pool, conversation, 10).await.unwrap().is_empty());
    }
}
