use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Idempotent; safe to run on every start.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Connector sources, created lazily on first successful ingestion
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            base_url TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // (source_id, external_id) is the ingestion idempotency key
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS announcements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER NOT NULL,
            external_id TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            url TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            published_at INTEGER NOT NULL DEFAULT 0,
            ingested_at INTEGER NOT NULL,
            lang TEXT NOT NULL DEFAULT 'tr',
            UNIQUE(source_id, external_id),
            FOREIGN KEY (source_id) REFERENCES sources(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one vector per record, the indexing idempotency guard
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings_map (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            record_id INTEGER NOT NULL,
            vector_id TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            UNIQUE(kind, record_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingestion_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'STARTED',
            started_at INTEGER NOT NULL,
            finished_at INTEGER,
            item_count INTEGER NOT NULL DEFAULT 0,
            message TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            conversation_key TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(user_id, conversation_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversation_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (conversation_id) REFERENCES conversations(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_preferences (
            user_id INTEGER PRIMARY KEY,
            verbosity_score INTEGER NOT NULL DEFAULT 50,
            citations_score INTEGER NOT NULL DEFAULT 50,
            format_score INTEGER NOT NULL DEFAULT 50,
            tone_score INTEGER NOT NULL DEFAULT 50,
            verbosity TEXT NOT NULL DEFAULT 'NORMAL',
            citations INTEGER NOT NULL DEFAULT 1,
            format TEXT NOT NULL DEFAULT 'DEFAULT',
            tone TEXT NOT NULL DEFAULT 'SIMPLE',
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_announcements_published_at ON announcements(published_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_announcements_category ON announcements(category)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON conversation_messages(conversation_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
