//! # Campus RAG CLI (`campus`)
//!
//! The `campus` binary drives the whole pipeline: database setup,
//! scraping and ingestion, vector indexing, and question answering.
//!
//! ## Usage
//!
//! ```bash
//! campus --config ./config/campus.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `campus init` | Create the SQLite database and run schema migrations |
//! | `campus sources` | List configured connectors and ingested sources |
//! | `campus ingest <connector>` | Scrape and ingest from a connector (`all` for every one) |
//! | `campus jobs` | Show recent ingestion job history |
//! | `campus ask "<question>"` | Answer a question from the indexed documents |
//! | `campus feedback <tag>...` | Apply response-style feedback tags |
//!
//! ## Examples
//!
//! ```bash
//! campus init --config ./config/campus.toml
//! campus ingest all
//! campus ask "Ne zaman kayıt yapılacak?"
//! campus feedback KISA_ISTIYORUM KAYNAK_ISTIYORUM
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use campus_rag::chroma::ChromaClient;
use campus_rag::config::{self, Config};
use campus_rag::connector::ConnectorRegistry;
use campus_rag::embedding::EmbeddingClient;
use campus_rag::models::Emotion;
use campus_rag::{ask, db, index, ingest, jobs, migrate, preference, sources};

/// Campus assistant pipeline: scrape announcement and FAQ sites, index
/// them in a vector store, and answer student questions with citations.
#[derive(Parser)]
#[command(
    name = "campus",
    about = "Campus RAG: scrape, index, and answer questions over campus announcements",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/campus.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent.
    Init,

    /// List configured connectors and ingested sources.
    Sources,

    /// Scrape a connector and ingest new announcements, then index them.
    ///
    /// Connector specifier: `all` or a connector code (`listing`,
    /// `faq_portal`, `fixture`).
    Ingest {
        connector: String,

        /// Skip the vector indexing step after ingestion.
        #[arg(long)]
        no_index: bool,
    },

    /// Show recent ingestion job history.
    Jobs {
        /// Maximum number of jobs to show.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Answer a question from the indexed documents.
    Ask {
        /// The question text.
        question: String,

        /// User id for preferences and conversation memory.
        #[arg(long, default_value_t = 1)]
        user: i64,

        /// Force an emotion label (ANXIOUS, ANGRY, SAD, HAPPY, NEUTRAL)
        /// instead of calling the classifier.
        #[arg(long)]
        emotion: Option<String>,

        /// Also print the speech-safe variant of the answer.
        #[arg(long)]
        speech: bool,
    },

    /// Apply response-style feedback tags for a user.
    ///
    /// Known tags: KISA_ISTIYORUM, NORMAL_ISTIYORUM, KAYNAK_ISTIYORUM,
    /// KAYNAK_ISTEMIYORUM, ADIM_ADIM, FORMAT_DEFAULT, TEKNIK_ANLAT,
    /// BASIT_ANLAT. Unknown tags are ignored.
    Feedback {
        /// One or more feedback tags.
        #[arg(required = true)]
        tags: Vec<String>,

        /// User id the feedback applies to.
        #[arg(long, default_value_t = 1)]
        user: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg).await?;
        }
        Commands::Ingest {
            connector,
            no_index,
        } => {
            run_ingest(&cfg, &connector, no_index).await?;
        }
        Commands::Jobs { limit } => {
            jobs::list_jobs(&cfg, limit).await?;
        }
        Commands::Ask {
            question,
            user,
            emotion,
            speech,
        } => {
            run_ask(&cfg, user, &question, emotion.as_deref(), speech).await?;
        }
        Commands::Feedback { tags, user } => {
            run_feedback(&cfg, user, &tags).await?;
        }
    }

    Ok(())
}

async fn run_ingest(cfg: &Config, connector: &str, no_index: bool) -> Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::create_schema(&pool).await?;

    let registry = ConnectorRegistry::from_config(cfg);
    if registry.is_empty() {
        anyhow::bail!("no connectors configured; add a [connectors] section to the config");
    }

    let reports = if connector == "all" {
        ingest::run_pull_all(&pool, &registry).await?
    } else {
        let Some(found) = registry.find(connector) else {
            anyhow::bail!(
                "unknown connector '{}'; configured: {}",
                connector,
                registry
                    .connectors()
                    .iter()
                    .map(|c| c.code())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        };
        vec![ingest::run_pull(&pool, found).await?]
    };

    for report in &reports {
        match &report.error {
            None => println!("{}: {} new announcements", report.connector, report.inserted),
            Some(e) => println!("{}: FAILED ({})", report.connector, e),
        }
    }

    if !no_index {
        // Also picks up records left unindexed by an earlier failed pass.
        let embedder = EmbeddingClient::new(cfg.embedding.clone());
        let store = ChromaClient::new(cfg.chroma.clone());
        store.ensure_collection().await;
        let indexer = index::Indexer::new(&pool, &embedder, &store);
        indexer.index_pending().await?;
    }

    pool.close().await;
    Ok(())
}

async fn run_ask(
    cfg: &Config,
    user: i64,
    question: &str,
    emotion: Option<&str>,
    speech: bool,
) -> Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::create_schema(&pool).await?;

    let assistant = ask::Assistant::new(pool.clone(), cfg.clone());
    let answer = assistant
        .answer_with_emotion(user, question, emotion.map(Emotion::from_label))
        .await?;

    println!("{}", answer.text);
    if speech {
        println!();
        println!("--- speech ---");
        println!("{}", answer.speech_text);
    }

    pool.close().await;
    Ok(())
}

async fn run_feedback(cfg: &Config, user: i64, tags: &[String]) -> Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::create_schema(&pool).await?;

    let profile = preference::apply_feedback(&pool, user, tags, &cfg.preferences).await?;
    println!(
        "verbosity: {:?} ({}), citations: {} ({}), format: {:?} ({}), tone: {:?} ({})",
        profile.verbosity,
        profile.verbosity_score,
        profile.citations,
        profile.citations_score,
        profile.format,
        profile.format_score,
        profile.tone,
        profile.tone_score
    );

    pool.close().await;
    Ok(())
}
