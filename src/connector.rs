//! Source connector contract and registry.
//!
//! Each external site gets its own connector implementing [`Connector`].
//! Site-specific parsing stays inside the connector; the ingestion
//! coordinator only sees `code()` and `fetch_latest()`.

use async_trait::async_trait;

use crate::config::Config;
use crate::connector_faq::FaqConnector;
use crate::connector_fixture::FixtureConnector;
use crate::connector_listing::ListingConnector;
use crate::error::FetchError;
use crate::models::RawDocument;

/// A source-specific fetcher producing raw documents.
///
/// Implementations must isolate per-item failures: a single unreachable
/// detail page is logged and skipped, never aborting the remaining items.
/// A `FetchError` from `fetch_latest` means the crawl as a whole failed.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stable identifier for this source (e.g. `"listing"`, `"faq_portal"`).
    /// Used as the source code in the record store.
    fn code(&self) -> &str;

    /// Human-readable one-liner for `campus sources` output.
    fn description(&self) -> &str;

    /// Base URL of the scraped site, when there is one.
    fn base_url(&self) -> Option<&str> {
        None
    }

    /// Fetch the latest documents from the external site.
    async fn fetch_latest(&self) -> Result<Vec<RawDocument>, FetchError>;
}

/// Registry of configured connectors, built from the config file.
pub struct ConnectorRegistry {
    connectors: Vec<Box<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self {
            connectors: Vec::new(),
        }
    }

    /// Instantiate every connector enabled in the config.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        if let Some(cfg) = &config.connectors.listing {
            registry.register(Box::new(ListingConnector::new(cfg.clone())));
        }
        if let Some(cfg) = &config.connectors.faq {
            registry.register(Box::new(FaqConnector::new(cfg.clone())));
        }
        if config.connectors.fixture {
            registry.register(Box::new(FixtureConnector));
        }

        registry
    }

    pub fn register(&mut self, connector: Box<dyn Connector>) {
        self.connectors.push(connector);
    }

    pub fn connectors(&self) -> &[Box<dyn Connector>] {
        &self.connectors
    }

    pub fn find(&self, code: &str) -> Option<&dyn Connector> {
        self.connectors
            .iter()
            .find(|c| c.code() == code)
            .map(|c| c.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Browser-like user agent sent with every scraping request. Some of the
/// scraped portals serve different markup to unknown agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Per-request timeout for scraped sites.
pub const REQUEST_TIMEOUT_SECS: u64 = 15;
