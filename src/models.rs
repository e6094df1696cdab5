//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, retrieval matches, and job reports
//! that flow between the connectors, the ingestion coordinator, and the
//! answering pipeline.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Raw item produced by a connector before normalization. Transient;
/// never persisted as-is.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub external_id: String,
    pub title: String,
    /// HTML (or already-plain text) content as fetched from the site.
    pub html: String,
    pub url: String,
    pub category: String,
    pub published_at: DateTime<Utc>,
}

/// Normalized announcement record stored in SQLite.
///
/// `(source_id, external_id)` is unique, the ingestion idempotency key.
/// Immutable after insert; re-ingestion of an existing key is a no-op.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Announcement {
    pub id: i64,
    pub source_id: i64,
    pub external_id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub category: String,
    pub published_at: i64,
    pub ingested_at: i64,
    pub lang: String,
}

/// A retrieval result from the vector store. `distance` is a dissimilarity
/// score: 0 = identical, lower = more relevant.
#[derive(Debug, Clone)]
pub struct DocumentMatch {
    pub text: String,
    pub metadata: Value,
    pub distance: f64,
}

impl DocumentMatch {
    pub fn url(&self) -> Option<&str> {
        self.metadata.get("url").and_then(|v| v.as_str())
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(|v| v.as_str())
    }
}

/// Ingestion job lifecycle states. A job is created STARTED and mutated
/// exactly once to SUCCESS or FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Started,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Started => "STARTED",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
        }
    }
}

/// Outcome of one ingestion run for one connector.
#[derive(Debug, Clone)]
pub struct PullReport {
    pub connector: String,
    pub ok: bool,
    pub inserted: u64,
    pub error: Option<String>,
}

/// Detected emotional state of the user's utterance. Drives one directive
/// line in the prompt policy; `Unknown` selects the default directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emotion {
    Anxious,
    Angry,
    Sad,
    Happy,
    Neutral,
    Unknown,
}

impl Emotion {
    /// Parse a classifier label. Unrecognized labels map to `Unknown`
    /// rather than failing.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "ANXIOUS" => Emotion::Anxious,
            "ANGRY" => Emotion::Angry,
            "SAD" => Emotion::Sad,
            "HAPPY" => Emotion::Happy,
            "NEUTRAL" => Emotion::Neutral,
            _ => Emotion::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Anxious => "ANXIOUS",
            Emotion::Angry => "ANGRY",
            Emotion::Sad => "SAD",
            Emotion::Happy => "HAPPY",
            Emotion::Neutral => "NEUTRAL",
            Emotion::Unknown => "UNKNOWN",
        }
    }
}

/// Message role inside a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }

    pub fn from_db(s: &str) -> Self {
        if s == "ASSISTANT" {
            Role::Assistant
        } else {
            Role::User
        }
    }
}

/// A stored conversation message read back for prompt construction.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotion_label_roundtrip() {
        assert_eq!(Emotion::from_label("sad"), Emotion::Sad);
        assert_eq!(Emotion::from_label(" HAPPY "), Emotion::Happy);
        assert_eq!(Emotion::from_label("confused"), Emotion::Unknown);
        assert_eq!(Emotion::from_label(""), Emotion::Unknown);
    }

    #[test]
    fn match_metadata_accessors() {
        let m = DocumentMatch {
            text: "t".into(),
            metadata: serde_json::json!({"url": "https://x/1", "title": "T"}),
            distance: 0.2,
        };
        assert_eq!(m.url(), Some("https://x/1"));
        assert_eq!(m.title(), Some("T"));

        let empty = DocumentMatch {
            text: String::new(),
            metadata: serde_json::json!({}),
            distance: 0.9,
        };
        assert_eq!(empty.url(), None);
    }
}
