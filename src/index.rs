//! Vector indexing for ingested announcements.
//!
//! Each announcement gets at most one vector in the store, identified by
//! `ann_<id>`. The `embeddings_map` table is the guard: a row keyed by
//! `(kind, record_id)` means the record has already been indexed, and
//! the map row is only written after the store upsert succeeds. Crashing
//! between upsert and map insert leaves the record re-indexable, which
//! the store's upsert semantics make harmless.

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::SqlitePool;

use crate::chroma::ChromaClient;
use crate::embedding::EmbeddingClient;
use crate::models::Announcement;

const KIND_ANNOUNCEMENT: &str = "announcement";

pub struct Indexer<'a> {
    pool: &'a SqlitePool,
    embedder: &'a EmbeddingClient,
    store: &'a ChromaClient,
}

#[derive(Debug, Default)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl<'a> Indexer<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        embedder: &'a EmbeddingClient,
        store: &'a ChromaClient,
    ) -> Self {
        Self {
            pool,
            embedder,
            store,
        }
    }

    /// Index every announcement without an `embeddings_map` row.
    /// Per-record failures are logged and counted, not propagated, so a
    /// flaky store does not abort the whole pass.
    pub async fn index_pending(&self) -> Result<IndexReport> {
        let pending: Vec<Announcement> = sqlx::query_as(
            r#"
            SELECT a.*
            FROM announcements a
            LEFT JOIN embeddings_map m
              ON m.kind = ? AND m.record_id = a.id
            WHERE m.id IS NULL
            ORDER BY a.id
            "#,
        )
        .bind(KIND_ANNOUNCEMENT)
        .fetch_all(self.pool)
        .await
        .context("loading unindexed announcements")?;

        let mut report = IndexReport::default();
        println!("index: {} announcements pending", pending.len());

        for announcement in pending {
            match self.index_one(&announcement).await {
                Ok(true) => report.indexed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    eprintln!(
                        "index: failed for announcement {} ({}): {:#}",
                        announcement.id, announcement.external_id, e
                    );
                    report.failed += 1;
                }
            }
        }

        println!(
            "index: done ({} indexed, {} skipped, {} failed)",
            report.indexed, report.skipped, report.failed
        );
        Ok(report)
    }

    /// Index a single announcement. Returns `Ok(false)` when the guard
    /// row already exists.
    pub async fn index_one(&self, announcement: &Announcement) -> Result<bool> {
        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM embeddings_map WHERE kind = ? AND record_id = ?",
        )
        .bind(KIND_ANNOUNCEMENT)
        .bind(announcement.id)
        .fetch_optional(self.pool)
        .await?;
        if existing.is_some() {
            return Ok(false);
        }

        let vector_id = format!("ann_{}", announcement.id);
        let text = embedding_text(announcement);
        let vector = self
            .embedder
            .embed_query(&text)
            .await
            .with_context(|| format!("embedding announcement {}", announcement.id))?;

        let metadata = json!({
            "source_id": announcement.source_id,
            "external_id": announcement.external_id,
            "title": announcement.title,
            "url": announcement.url,
            "category": announcement.category,
            "published_at": announcement.published_at,
            "lang": announcement.lang,
        });

        self.store
            .upsert(&vector_id, &vector, &text, metadata)
            .await
            .with_context(|| format!("upserting vector {}", vector_id))?;

        // Map row last: recorded only for vectors that made it to the store.
        sqlx::query(
            r#"
            INSERT INTO embeddings_map (kind, record_id, vector_id, created_at)
            VALUES (?, ?, ?, strftime('%s','now'))
            ON CONFLICT(kind, record_id) DO NOTHING
            "#,
        )
        .bind(KIND_ANNOUNCEMENT)
        .bind(announcement.id)
        .bind(&vector_id)
        .execute(self.pool)
        .await?;

        Ok(true)
    }
}

/// Text sent to the embedder: title and body, title first so short
/// queries about a topic still land near the announcement.
fn embedding_text(announcement: &Announcement) -> String {
    format!("{}\n\n{}", announcement.title.trim(), announcement.content.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Announcement {
        Announcement {
            id: 7,
            source_id: 1,
            external_id: "101".to_string(),
            title: "Kayıt Duyurusu".to_string(),
            content: "Kayıtlar 20 Ekim 2025 tarihinde başlar.".to_string(),
            url: "https://example.edu/duyuru/101/kayit".to_string(),
            category: "duyuru".to_string(),
            published_at: 1760907600,
            ingested_at: 1760910000,
            lang: "tr".to_string(),
        }
    }

    #[test]
    fn embedding_text_is_title_then_body() {
        let text = embedding_text(&sample());
        assert!(text.starts_with("Kayıt Duyurusu\n\n"));
        assert!(text.contains("20 Ekim 2025"));
    }
}
