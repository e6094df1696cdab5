//! Ingestion job history listing.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::db;

/// Print the most recent ingestion jobs, newest first.
pub async fn list_jobs(config: &Config, limit: i64) -> Result<()> {
    let pool = db::connect(config).await?;

    let rows: Vec<(i64, String, String, i64, Option<i64>, i64, Option<String>)> = sqlx::query_as(
        r#"
        SELECT id, job_name, status, started_at, finished_at, item_count, message
        FROM ingestion_jobs
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(&pool)
    .await?;

    println!(
        "{:<6} {:<24} {:<9} {:<20} {:<8} MESSAGE",
        "ID", "JOB", "STATUS", "STARTED", "ITEMS"
    );
    if rows.is_empty() {
        println!("(no jobs yet)");
    }
    for (id, name, status, started_at, _finished_at, items, message) in rows {
        println!(
            "{:<6} {:<24} {:<9} {:<20} {:<8} {}",
            id,
            name,
            status,
            format_ts(started_at),
            items,
            message.as_deref().unwrap_or("-")
        );
    }

    pool.close().await;
    Ok(())
}

fn format_ts(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}
