//! End-to-end pipeline tests against mocked external services.
//!
//! The vector store, the embedding endpoint, and the generation endpoint
//! are all wiremock servers; SQLite lives in a temp directory. These
//! tests exercise the same paths the `campus` binary drives: ingest,
//! index, ask.

use serde_json::json;
use sqlx::SqlitePool;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use campus_rag::ask::Assistant;
use campus_rag::chroma::ChromaClient;
use campus_rag::config::Config;
use campus_rag::connector_fixture::FixtureConnector;
use campus_rag::embedding::EmbeddingClient;
use campus_rag::index::Indexer;
use campus_rag::{db, ingest, migrate};

const TEST_KEY_ENV: &str = "CAMPUS_RAG_TEST_API_KEY";

fn test_config(dir: &TempDir, chroma_url: &str, openai_url: &str) -> Config {
    std::env::set_var(TEST_KEY_ENV, "test-key");
    let toml_str = format!(
        r#"
[db]
path = "{db}"

[chroma]
url = "{chroma}"
dims = 4
timeout_secs = 5

[embedding]
base_url = "{openai}"
model = "text-embedding-3-small"
api_key_env = "{key_env}"
max_retries = 0
timeout_secs = 5

[generation]
base_url = "{openai}"
model = "gpt-4o-mini"
api_key_env = "{key_env}"
timeout_secs = 5

[retrieval]
relevance_threshold = 0.6
top_k = 8
fallback_matches = 2
"#,
        db = dir.path().join("campus.sqlite").display(),
        chroma = chroma_url,
        openai = openai_url,
        key_env = TEST_KEY_ENV,
    );
    toml::from_str(&toml_str).unwrap()
}

async fn setup_db(config: &Config) -> SqlitePool {
    let pool = db::connect(config).await.unwrap();
    migrate::create_schema(&pool).await.unwrap();
    pool
}

async fn mock_collection_lookup(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/collections"))
        .and(query_param("name", "campus_kg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"collections": [{"id": "col-1"}]})),
        )
        .mount(server)
        .await;
}

async fn mock_embeddings(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.1, 0.2, 0.3, 0.4]}]
        })))
        .mount(server)
        .await;
}

async fn mock_generation(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn ingest_then_index_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let chroma = MockServer::start().await;
    let openai = MockServer::start().await;
    let config = test_config(&dir, &chroma.uri(), &openai.uri());
    let pool = setup_db(&config).await;

    mock_collection_lookup(&chroma).await;
    mock_embeddings(&openai).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/col-1/upsert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&chroma)
        .await;

    let first = ingest::run_pull(&pool, &FixtureConnector).await.unwrap();
    assert!(first.ok);
    assert_eq!(first.inserted, 2);

    let second = ingest::run_pull(&pool, &FixtureConnector).await.unwrap();
    assert_eq!(second.inserted, 0);

    let embedder = EmbeddingClient::new(config.embedding.clone());
    let store = ChromaClient::new(config.chroma.clone());
    let indexer = Indexer::new(&pool, &embedder, &store);

    let report = indexer.index_pending().await.unwrap();
    assert_eq!(report.indexed, 2);
    assert_eq!(report.failed, 0);

    // Second pass finds nothing pending.
    let report = indexer.index_pending().await.unwrap();
    assert_eq!(report.indexed, 0);

    let (mapped,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM embeddings_map")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mapped, 2);

    let (vector_id,): (String,) =
        sqlx::query_as("SELECT vector_id FROM embeddings_map ORDER BY record_id LIMIT 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(vector_id.starts_with("ann_"));
}

#[tokio::test]
async fn grounded_answer_carries_resolved_citation() {
    let dir = TempDir::new().unwrap();
    let chroma = MockServer::start().await;
    let openai = MockServer::start().await;
    let config = test_config(&dir, &chroma.uri(), &openai.uri());
    let pool = setup_db(&config).await;

    mock_collection_lookup(&chroma).await;
    mock_embeddings(&openai).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/col-1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [["Kayıtlar 20 Ekim 2025 tarihinde başlayacaktır."]],
            "distances": [[0.3]],
            "metadatas": [[{
                "title": "Kayıt Duyurusu",
                "url": "https://example.edu/duyuru/101"
            }]],
        })))
        .mount(&chroma)
        .await;
    mock_generation(
        &openai,
        "Kayıtlar 20 Ekim 2025 tarihinde başlayacak.\nKULLANILAN_KAYNAK: S1",
    )
    .await;

    let assistant = Assistant::new(pool.clone(), config.clone());
    let answer = assistant.answer(1, "Ne zaman kayıt yapılacak?").await.unwrap();

    assert!(answer.grounded);
    assert_eq!(answer.citation.as_deref(), Some("https://example.edu/duyuru/101"));
    assert!(answer.text.ends_with("Kaynak: https://example.edu/duyuru/101"));
    assert!(!answer.text.contains("KULLANILAN_KAYNAK"));
    assert!(!answer.speech_text.contains("http"));

    // Both sides of the exchange were appended to memory.
    let (messages,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversation_messages")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(messages, 2);
}

#[tokio::test]
async fn empty_retrieval_falls_back_without_generation() {
    let dir = TempDir::new().unwrap();
    let chroma = MockServer::start().await;
    let openai = MockServer::start().await;
    let config = test_config(&dir, &chroma.uri(), &openai.uri());
    let pool = setup_db(&config).await;

    mock_collection_lookup(&chroma).await;
    mock_embeddings(&openai).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/col-1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [[]],
            "distances": [[]],
            "metadatas": [[]],
        })))
        .mount(&chroma)
        .await;
    // The generation endpoint must never be hit on this path.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&openai)
        .await;

    let assistant = Assistant::new(pool.clone(), config.clone());
    let answer = assistant.answer(1, "Mars'a nasıl giderim?").await.unwrap();

    assert!(!answer.grounded);
    assert!(answer.citation.is_none());
    assert!(answer.text.contains("net bir bilgi bulamadım"));
}

#[tokio::test]
async fn vector_store_outage_fails_closed() {
    let dir = TempDir::new().unwrap();
    let chroma = MockServer::start().await;
    let openai = MockServer::start().await;
    let config = test_config(&dir, &chroma.uri(), &openai.uri());
    let pool = setup_db(&config).await;

    mock_embeddings(&openai).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/collections"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&chroma)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&chroma)
        .await;

    let assistant = Assistant::new(pool.clone(), config.clone());
    let answer = assistant.answer(1, "Ne zaman kayıt yapılacak?").await.unwrap();

    assert!(!answer.grounded);
    assert!(answer.text.contains("net bir bilgi bulamadım"));
}

#[tokio::test]
async fn memory_question_never_touches_the_index() {
    let dir = TempDir::new().unwrap();
    let chroma = MockServer::start().await;
    let openai = MockServer::start().await;
    let config = test_config(&dir, &chroma.uri(), &openai.uri());
    let pool = setup_db(&config).await;

    // Retrieval endpoints must stay cold for memory questions.
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&openai)
        .await;
    mock_generation(
        &openai,
        "Bu konuşmada böyle bir bilgi bulamadım.\nKULLANILAN_KAYNAK: YOK",
    )
    .await;

    let assistant = Assistant::new(pool.clone(), config.clone());
    let answer = assistant.answer(1, "Az önce ne söyledin?").await.unwrap();

    assert!(!answer.grounded);
    assert!(answer.citation.is_none());
    assert!(answer.text.contains("Bu konuşmada böyle bir bilgi bulamadım"));
    assert!(!answer.text.contains("KULLANILAN_KAYNAK"));
}
