//! Retrieval and the relevance gate.
//!
//! The vector store returns the nearest `top_k` matches regardless of
//! how near they actually are; the gate decides whether any of them are
//! close enough to ground an answer. Matches at or under the distance
//! threshold are usable context. When none qualify, the question is out
//! of scope and only a couple of raw matches are kept as weak hints.
//!
//! Store and embedding failures degrade to [`Retrieval::Unavailable`]
//! instead of propagating: a flaky vector store must never take the
//! assistant down, it just answers without context.

use crate::chroma::ChromaClient;
use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingClient;
use crate::models::DocumentMatch;

/// What retrieval produced for one question.
#[derive(Debug)]
pub enum Retrieval {
    /// At least one match passed the gate; answer from this context.
    Grounded(Vec<DocumentMatch>),
    /// Matches came back but none were close enough. Carries the best
    /// few raw matches as hints; the answer must say nothing was found.
    OutOfScope(Vec<DocumentMatch>),
    /// Embedding or store failure; no context at all.
    Unavailable,
}

impl Retrieval {
    pub fn matches(&self) -> &[DocumentMatch] {
        match self {
            Retrieval::Grounded(m) | Retrieval::OutOfScope(m) => m,
            Retrieval::Unavailable => &[],
        }
    }

    pub fn is_grounded(&self) -> bool {
        matches!(self, Retrieval::Grounded(_))
    }
}

/// Split raw matches at the distance threshold. Order within each bucket
/// follows the store's ordering (ascending distance).
pub fn gate_matches(matches: Vec<DocumentMatch>, config: &RetrievalConfig) -> Retrieval {
    let usable: Vec<DocumentMatch> = matches
        .iter()
        .filter(|m| m.distance <= config.relevance_threshold)
        .cloned()
        .collect();

    if !usable.is_empty() {
        return Retrieval::Grounded(usable);
    }

    let hints: Vec<DocumentMatch> = matches
        .into_iter()
        .take(config.fallback_matches)
        .collect();
    Retrieval::OutOfScope(hints)
}

/// Embed the question and query the store, gated. Never fails.
pub async fn retrieve(
    embedder: &EmbeddingClient,
    store: &ChromaClient,
    config: &RetrievalConfig,
    question: &str,
) -> Retrieval {
    let embedding = match embedder.embed_query(question).await {
        Ok(v) => v,
        Err(e) => {
            eprintln!("retrieve: question embedding failed: {:#}", e);
            return Retrieval::Unavailable;
        }
    };

    let mut matches = match store.query(&embedding, config.top_k).await {
        Ok(m) => m,
        Err(e) => {
            eprintln!("retrieve: vector store query failed: {}", e);
            return Retrieval::Unavailable;
        }
    };
    // The store is not trusted to return pre-sorted results.
    matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let outcome = gate_matches(matches, config);
    match &outcome {
        Retrieval::Grounded(m) => {
            println!("retrieve: {} usable matches (threshold {})", m.len(), config.relevance_threshold)
        }
        Retrieval::OutOfScope(m) => {
            println!("retrieve: out of scope, {} hint matches kept", m.len())
        }
        Retrieval::Unavailable => {}
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn m(distance: f64) -> DocumentMatch {
        DocumentMatch {
            text: format!("match at {}", distance),
            metadata: json!({}),
            distance,
        }
    }

    fn config(threshold: f64) -> RetrievalConfig {
        RetrievalConfig {
            relevance_threshold: threshold,
            top_k: 8,
            fallback_matches: 2,
        }
    }

    #[test]
    fn matches_under_threshold_are_grounded() {
        let out = gate_matches(vec![m(0.5), m(0.8)], &config(0.6));
        match out {
            Retrieval::Grounded(matches) => {
                assert_eq!(matches.len(), 1);
                assert!((matches[0].distance - 0.5).abs() < 1e-9);
            }
            other => panic!("expected grounded, got {:?}", other),
        }
    }

    #[test]
    fn boundary_distance_is_usable() {
        let out = gate_matches(vec![m(0.6)], &config(0.6));
        assert!(out.is_grounded());
    }

    #[test]
    fn all_far_matches_go_out_of_scope_with_hints() {
        let out = gate_matches(vec![m(0.9), m(1.1), m(1.4)], &config(0.6));
        match out {
            Retrieval::OutOfScope(hints) => {
                assert_eq!(hints.len(), 2);
                assert!((hints[0].distance - 0.9).abs() < 1e-9);
            }
            other => panic!("expected out of scope, got {:?}", other),
        }
    }

    #[test]
    fn empty_result_is_out_of_scope() {
        let out = gate_matches(vec![], &config(0.75));
        assert!(!out.is_grounded());
        assert!(out.matches().is_empty());
    }
}
