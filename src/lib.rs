//! # Campus RAG
//!
//! A retrieval-augmented question-answering pipeline for campus
//! announcement and FAQ sites. Connectors scrape external sources into
//! a local SQLite store, announcements are embedded and indexed in a
//! Chroma-compatible vector store, and questions are answered from the
//! retrieved context with per-user style preferences, conversation
//! memory, and verifiable citations.
//!
//! ## Pipeline
//!
//! | Stage | Module |
//! |-------|--------|
//! | Source connectors | [`connector`], [`connector_listing`], [`connector_faq`], [`connector_fixture`] |
//! | Normalization | [`normalize`] |
//! | Ingestion + jobs | [`ingest`] |
//! | Embedding | [`embedding`] |
//! | Vector store | [`chroma`] |
//! | Vector indexing | [`index`] |
//! | Retrieval gate | [`retrieve`] |
//! | Preferences | [`preference`] |
//! | Conversation memory | [`memory`] |
//! | Prompt construction | [`prompt`] |
//! | Generation | [`generation`], [`emotion`] |
//! | Post-processing | [`postprocess`] |
//! | Orchestration | [`ask`] |

pub mod ask;
pub mod chroma;
pub mod config;
pub mod connector;
pub mod connector_faq;
pub mod connector_fixture;
pub mod connector_listing;
pub mod db;
pub mod embedding;
pub mod emotion;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod jobs;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod postprocess;
pub mod preference;
pub mod prompt;
pub mod retrieve;
pub mod sources;
