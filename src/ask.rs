//! The question-answering pipeline.
//!
//! One question runs one sequential pass: emotion signal, profile and
//! history load, memory-question check, retrieval with the relevance
//! gate, generation, post-processing, then a history append for both
//! sides of the exchange. Retrieval and generation failures resolve to
//! polite canned fallbacks; the pipeline itself only fails on
//! persistence errors.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::chroma::ChromaClient;
use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::emotion::EmotionClient;
use crate::generation::GenerationClient;
use crate::memory;
use crate::models::{Emotion, Role};
use crate::postprocess::{self, ProcessedAnswer};
use crate::preference::{self, PreferenceProfile};
use crate::prompt;
use crate::retrieve::{self, Retrieval};

/// Shown when nothing relevant exists in the index or the store is down.
const FALLBACK_NO_CONTEXT: &str =
    "Bu soru için duyurularda net bir bilgi bulamadım. Sorunuzu biraz daha \
     netleştirirseniz tekrar bakabilirim.";

/// Shown when the generation call itself fails.
const FALLBACK_GENERATION: &str =
    "Şu anda cevap oluşturamıyorum. Lütfen biraz sonra tekrar deneyin.";

/// One answered question, ready for display or speech.
pub struct Answer {
    pub text: String,
    /// Speech-safe variant of `text` (no URLs, no source section).
    pub speech_text: String,
    pub citation: Option<String>,
    pub emotion: Emotion,
    /// Whether the answer was grounded in retrieved context.
    pub grounded: bool,
}

pub struct Assistant {
    pool: SqlitePool,
    config: Config,
    embedder: EmbeddingClient,
    store: ChromaClient,
    generator: GenerationClient,
    emotion: EmotionClient,
}

impl Assistant {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let embedder = EmbeddingClient::new(config.embedding.clone());
        let store = ChromaClient::new(config.chroma.clone());
        let generator = GenerationClient::new(config.generation.clone());
        let emotion = EmotionClient::new(config.emotion.clone());
        Self {
            pool,
            config,
            embedder,
            store,
            generator,
            emotion,
        }
    }

    /// Answer one question for one user.
    pub async fn answer(&self, user_id: i64, question: &str) -> Result<Answer> {
        self.answer_with_emotion(user_id, question, None).await
    }

    /// Like [`Assistant::answer`], with the emotion signal forced instead
    /// of classified.
    pub async fn answer_with_emotion(
        &self,
        user_id: i64,
        question: &str,
        emotion_override: Option<Emotion>,
    ) -> Result<Answer> {
        let emotion = match emotion_override {
            Some(e) => e,
            None => self.emotion.predict(question).await,
        };
        let profile = preference::load_profile(&self.pool, user_id).await?;
        let conversation = memory::ensure_conversation(
            &self.pool,
            user_id,
            &self.config.chat.conversation_key,
        )
        .await?;
        let history =
            memory::load_recent(&self.pool, conversation, self.config.chat.history_limit).await?;

        let answer = if prompt::is_memory_question(question) {
            self.answer_from_memory(emotion, &history, question).await
        } else {
            self.answer_from_index(&profile, emotion, &history, question)
                .await
        };

        memory::append_message(&self.pool, conversation, Role::User, question).await?;
        memory::append_message(&self.pool, conversation, Role::Assistant, &answer.text).await?;

        Ok(answer)
    }

    /// Memory questions bypass retrieval entirely: the model answers
    /// strictly from history, or says the answer is not there.
    async fn answer_from_memory(
        &self,
        emotion: Emotion,
        history: &[crate::models::StoredMessage],
        question: &str,
    ) -> Answer {
        let prompt_text = prompt::build_memory_prompt(history, question, &self.config.chat);

        let raw = match self.generator.generate(&prompt_text).await {
            Ok(text) => text,
            Err(e) => {
                eprintln!("ask: generation failed for memory question: {}", e);
                return fallback_answer(FALLBACK_GENERATION, emotion);
            }
        };

        // No context list, so no citation can resolve.
        let mut stripped = postprocess::strip_control_lines(&raw);
        if stripped.is_empty() {
            stripped = FALLBACK_GENERATION.to_string();
        }
        Answer {
            speech_text: postprocess::sanitize_for_speech(&stripped),
            text: stripped,
            citation: None,
            emotion,
            grounded: false,
        }
    }

    async fn answer_from_index(
        &self,
        profile: &PreferenceProfile,
        emotion: Emotion,
        history: &[crate::models::StoredMessage],
        question: &str,
    ) -> Answer {
        let retrieval = retrieve::retrieve(
            &self.embedder,
            &self.store,
            &self.config.retrieval,
            question,
        )
        .await;

        let (matches, grounded) = match &retrieval {
            Retrieval::Grounded(m) => (m.as_slice(), true),
            // Degraded: nothing passed the gate but the nearest raw
            // matches still go in as weak context.
            Retrieval::OutOfScope(hints) if !hints.is_empty() => (hints.as_slice(), false),
            Retrieval::OutOfScope(_) | Retrieval::Unavailable => {
                return fallback_answer(FALLBACK_NO_CONTEXT, emotion);
            }
        };

        let prompt_text = prompt::build_prompt(
            profile,
            emotion,
            history,
            matches,
            question,
            &self.config.chat,
        );

        let raw = match self.generator.generate(&prompt_text).await {
            Ok(text) => text,
            Err(e) => {
                eprintln!("ask: generation failed: {}", e);
                return fallback_answer(FALLBACK_GENERATION, emotion);
            }
        };

        let ProcessedAnswer { text, citation } =
            postprocess::process_answer(&raw, matches, profile);

        Answer {
            speech_text: postprocess::sanitize_for_speech(&text),
            text,
            citation,
            emotion,
            grounded,
        }
    }
}

fn fallback_answer(text: &str, emotion: Emotion) -> Answer {
    Answer {
        text: text.to_string(),
        speech_text: text.to_string(),
        citation: None,
        emotion,
        grounded: false,
    }
}
