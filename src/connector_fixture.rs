//! Static fixture connector for smoke tests and demos.

use async_trait::async_trait;
use chrono::Utc;

use crate::connector::Connector;
use crate::error::FetchError;
use crate::models::RawDocument;

/// Returns two fixed documents without touching the network. Lets the whole
/// ingest → index → ask path run locally before any real site is wired up.
pub struct FixtureConnector;

#[async_trait]
impl Connector for FixtureConnector {
    fn code(&self) -> &str {
        "fixture"
    }

    fn description(&self) -> &str {
        "Static fixture documents (no network)"
    }

    async fn fetch_latest(&self) -> Result<Vec<RawDocument>, FetchError> {
        let now = Utc::now();
        Ok(vec![
            RawDocument {
                external_id: "ext-1".to_string(),
                title: "Kayit Duyurusu".to_string(),
                html: "<p>Kayit tarihleri ve ders secimi hakkinda bilgi.</p>".to_string(),
                url: "https://example.edu/duyuru/1".to_string(),
                category: "kayit".to_string(),
                published_at: now,
            },
            RawDocument {
                external_id: "ext-2".to_string(),
                title: "Burs Basvurusu".to_string(),
                html: "<p>Burs basvurulari icin son tarih duyurusu.</p>".to_string(),
                url: "https://example.edu/duyuru/2".to_string(),
                category: "burs".to_string(),
                published_at: now,
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_two_stable_documents() {
        let docs = FixtureConnector.fetch_latest().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].external_id, "ext-1");
        assert_eq!(docs[1].external_id, "ext-2");
    }
}
