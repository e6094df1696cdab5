//! Ingestion coordinator.
//!
//! One ingestion run per connector: a job row is created STARTED, the
//! connector fetches its latest documents, each document is normalized
//! and inserted under the `(source_id, external_id)` idempotency key,
//! and the job is closed SUCCESS or FAILED. `finished_at` is written on
//! both paths, so a job left in STARTED means the process died mid-run.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::connector::{Connector, ConnectorRegistry};
use crate::models::{JobStatus, PullReport, RawDocument};
use crate::normalize;

/// Resolve (or lazily create) the `sources` row for a connector.
pub async fn ensure_source(pool: &SqlitePool, connector: &dyn Connector) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO sources (code, name, base_url)
        VALUES (?, ?, ?)
        ON CONFLICT(code) DO UPDATE SET base_url = excluded.base_url
        "#,
    )
    .bind(connector.code())
    .bind(connector.description())
    .bind(connector.base_url())
    .execute(pool)
    .await?;

    let (id,): (i64,) = sqlx::query_as("SELECT id FROM sources WHERE code = ?")
        .bind(connector.code())
        .fetch_one(pool)
        .await?;
    Ok(id)
}

/// Insert normalized documents, skipping already-seen external ids.
/// Returns the number of rows actually inserted.
pub async fn ingest_documents(
    pool: &SqlitePool,
    source_id: i64,
    documents: &[RawDocument],
) -> Result<u64> {
    let mut inserted = 0u64;

    for doc in documents {
        let content = normalize::html_to_text(&doc.html);
        let result = sqlx::query(
            r#"
            INSERT INTO announcements
                (source_id, external_id, title, content, url, category,
                 published_at, ingested_at, lang)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'tr')
            ON CONFLICT(source_id, external_id) DO NOTHING
            "#,
        )
        .bind(source_id)
        .bind(&doc.external_id)
        .bind(&doc.title)
        .bind(&content)
        .bind(&doc.url)
        .bind(&doc.category)
        .bind(doc.published_at.timestamp())
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await
        .with_context(|| format!("inserting announcement {}", doc.external_id))?;

        inserted += result.rows_affected();
    }

    Ok(inserted)
}

async fn open_job(pool: &SqlitePool, job_name: &str) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO ingestion_jobs (job_name, status, started_at) VALUES (?, ?, ?)",
    )
    .bind(job_name)
    .bind(JobStatus::Started.as_str())
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn close_job(
    pool: &SqlitePool,
    job_id: i64,
    status: JobStatus,
    item_count: u64,
    message: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE ingestion_jobs
        SET status = ?, finished_at = ?, item_count = ?, message = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(Utc::now().timestamp())
    .bind(item_count as i64)
    .bind(message)
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Run one full pull for a connector, wrapped in a job record. Fetch or
/// insert failures close the job FAILED and are reported, not returned,
/// so one broken connector does not stop the others.
pub async fn run_pull(pool: &SqlitePool, connector: &dyn Connector) -> Result<PullReport> {
    let job_name = format!("pull:{}", connector.code());
    let job_id = open_job(pool, &job_name).await?;
    println!("ingest: job {} ({}) started", job_id, job_name);

    let outcome = pull_into_db(pool, connector).await;

    match outcome {
        Ok(inserted) => {
            close_job(pool, job_id, JobStatus::Success, inserted, None).await?;
            println!(
                "ingest: job {} succeeded, {} new announcements",
                job_id, inserted
            );
            Ok(PullReport {
                connector: connector.code().to_string(),
                ok: true,
                inserted,
                error: None,
            })
        }
        Err(e) => {
            let message = format!("{:#}", e);
            close_job(pool, job_id, JobStatus::Failed, 0, Some(&message)).await?;
            eprintln!("ingest: job {} failed: {}", job_id, message);
            Ok(PullReport {
                connector: connector.code().to_string(),
                ok: false,
                inserted: 0,
                error: Some(message),
            })
        }
    }
}

async fn pull_into_db(pool: &SqlitePool, connector: &dyn Connector) -> Result<u64> {
    let source_id = ensure_source(pool, connector).await?;
    let documents = connector
        .fetch_latest()
        .await
        .with_context(|| format!("fetching from connector '{}'", connector.code()))?;
    println!(
        "ingest: connector '{}' returned {} documents",
        connector.code(),
        documents.len()
    );
    ingest_documents(pool, source_id, &documents).await
}

/// Pull every registered connector in sequence.
pub async fn run_pull_all(
    pool: &SqlitePool,
    registry: &ConnectorRegistry,
) -> Result<Vec<PullReport>> {
    let mut reports = Vec::new();
    for connector in registry.connectors() {
        let report = run_pull(pool, connector.as_ref()).await?;
        reports.push(report);
    }
    Ok(reports)
}
