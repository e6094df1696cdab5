//! Connector and source listing.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::connector::ConnectorRegistry;
use crate::db;

/// List configured connectors and the sources already seen in the
/// database.
pub async fn list_sources(config: &Config) -> Result<()> {
    let registry = ConnectorRegistry::from_config(config);

    println!("{:<16} {:<52} BASE URL", "CONNECTOR", "DESCRIPTION");
    if registry.is_empty() {
        println!("(no connectors configured)");
    }
    for connector in registry.connectors() {
        println!(
            "{:<16} {:<52} {}",
            connector.code(),
            connector.description(),
            connector.base_url().unwrap_or("-")
        );
    }

    let pool = db::connect(config).await?;
    print_known_sources(&pool).await?;
    pool.close().await;
    Ok(())
}

async fn print_known_sources(pool: &SqlitePool) -> Result<()> {
    let rows: Vec<(i64, String, i64)> = sqlx::query_as(
        r#"
        SELECT s.id, s.code, COUNT(a.id)
        FROM sources s
        LEFT JOIN announcements a ON a.source_id = s.id
        GROUP BY s.id
        ORDER BY s.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    println!();
    println!("{:<6} {:<16} ANNOUNCEMENTS", "ID", "CODE");
    if rows.is_empty() {
        println!("(no sources ingested yet)");
    }
    for (id, code, count) in rows {
        println!("{:<6} {:<16} {}", id, code, count);
    }
    Ok(())
}
