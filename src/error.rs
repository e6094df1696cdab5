//! Failure taxonomy for the pipeline stages that callers branch on.
//!
//! Connector fetches, vector-store calls, and generation calls fail in ways
//! the orchestration layer handles differently (skip item, fail job, fall
//! back to a canned answer), so they carry their own error types. Everything
//! else propagates through `anyhow`.

use thiserror::Error;

/// A connector failed to fetch or parse an external site.
///
/// Per-item fetch errors are caught and logged inside the connectors; a
/// `FetchError` returned from `fetch_latest` means the whole crawl failed
/// and the enclosing ingestion job is marked FAILED.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("parse failed: {0}")]
    Parse(String),
}

/// The vector store rejected a call or never resolved its collection id.
///
/// For indexing this fails the current document (retried on the next run
/// thanks to the embeddings_map guard); for retrieval the caller fails
/// closed and answers from the no-context fallback.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("collection id could not be resolved for '{0}'")]
    Unresolved(String),
    #[error("chroma {op} HTTP {status}: {body}")]
    Status {
        op: &'static str,
        status: u16,
        body: String,
    },
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected chroma response: {0}")]
    Malformed(String),
}

/// The generation gateway failed; the caller returns a generic apology
/// instead of partial output.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected generation response: {0}")]
    Malformed(String),
}
