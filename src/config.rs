use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub chroma: ChromaConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub emotion: EmotionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub preferences: PreferencesConfig,
    #[serde(default)]
    pub connectors: ConnectorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChromaConfig {
    /// Base URL of the Chroma server, e.g. `http://127.0.0.1:8000`.
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_collection() -> String {
    "campus_kg".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_openai_base")]
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_openai_base() -> String {
    "https://api.openai.com".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_openai_base")]
    pub base_url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base(),
            model: default_generation_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_generation_timeout() -> u64 {
    60
}

/// Optional emotion classifier endpoint. When `url` is unset, no network
/// call is made and the emotion defaults to UNKNOWN.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EmotionConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_emotion_timeout")]
    pub timeout_secs: u64,
}

fn default_emotion_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Matches with a distance above this are not trusted as context.
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// How many raw matches to fall back to when the usable subset is empty.
    #[serde(default = "default_fallback_matches")]
    pub fallback_matches: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: default_relevance_threshold(),
            top_k: default_top_k(),
            fallback_matches: default_fallback_matches(),
        }
    }
}

fn default_relevance_threshold() -> f64 {
    0.75
}
fn default_top_k() -> usize {
    8
}
fn default_fallback_matches() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,
    /// Per-message truncation when rendering history into the prompt.
    #[serde(default = "default_history_max_chars")]
    pub history_max_chars: usize,
    /// Per-match truncation when rendering retrieved context.
    #[serde(default = "default_context_max_chars")]
    pub context_max_chars: usize,
    #[serde(default = "default_conversation_key")]
    pub conversation_key: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            history_max_chars: default_history_max_chars(),
            context_max_chars: default_context_max_chars(),
            conversation_key: default_conversation_key(),
        }
    }
}

fn default_history_limit() -> i64 {
    10
}
fn default_history_max_chars() -> usize {
    600
}
fn default_context_max_chars() -> usize {
    2500
}
fn default_conversation_key() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PreferencesConfig {
    #[serde(default = "default_step")]
    pub step: i64,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: i64,
    #[serde(default = "default_low_threshold")]
    pub low_threshold: i64,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            step: default_step(),
            high_threshold: default_high_threshold(),
            low_threshold: default_low_threshold(),
        }
    }
}

fn default_step() -> i64 {
    15
}
fn default_high_threshold() -> i64 {
    60
}
fn default_low_threshold() -> i64 {
    40
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConnectorsConfig {
    pub listing: Option<ListingConnectorConfig>,
    pub faq: Option<FaqConnectorConfig>,
    /// Enable the static fixture connector (demos and smoke tests).
    #[serde(default)]
    pub fixture: bool,
}

/// A paginated announcement listing where the page index is a path segment
/// (`<base_url>/0/1`, `<base_url>/0/2`, ...).
#[derive(Debug, Deserialize, Clone)]
pub struct ListingConnectorConfig {
    #[serde(default = "default_listing_code")]
    pub code: String,
    pub base_url: String,
    /// CSS selector for the detail-page content block.
    #[serde(default = "default_content_selector")]
    pub content_selector: String,
    #[serde(default = "default_listing_category")]
    pub category: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_listing_sleep_ms")]
    pub sleep_ms: u64,
    /// Stop after the first page; useful during development.
    #[serde(default)]
    pub test_mode: bool,
}

fn default_listing_code() -> String {
    "listing".to_string()
}
fn default_content_selector() -> String {
    "div.blog-post-inner".to_string()
}
fn default_listing_category() -> String {
    "duyuru".to_string()
}
fn default_max_pages() -> u32 {
    200
}
fn default_listing_sleep_ms() -> u64 {
    300
}

/// A session-based FAQ portal: landing page for cookies, per-category
/// listing by POST, per-question modal by GET.
#[derive(Debug, Deserialize, Clone)]
pub struct FaqConnectorConfig {
    #[serde(default = "default_faq_code")]
    pub code: String,
    pub base_url: String,
    /// Page carrying the category menu; defaults to `<base_url>/`.
    #[serde(default)]
    pub menu_url: Option<String>,
    /// Comma-separated category ids; empty means auto-discover.
    #[serde(default)]
    pub category_ids: String,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_faq_sleep_ms")]
    pub sleep_ms: u64,
    /// Stop after 20 items; useful during development.
    #[serde(default)]
    pub test_mode: bool,
}

fn default_faq_code() -> String {
    "faq_portal".to_string()
}
fn default_max_items() -> usize {
    2000
}
fn default_faq_sleep_ms() -> u64 {
    200
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chroma.dims == 0 {
        anyhow::bail!("chroma.dims must be > 0");
    }
    if config.embedding.model.trim().is_empty() {
        anyhow::bail!("embedding.model must not be empty");
    }
    if !(0.0..=2.0).contains(&config.retrieval.relevance_threshold) {
        anyhow::bail!("retrieval.relevance_threshold must be in [0.0, 2.0]");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.preferences.low_threshold >= config.preferences.high_threshold {
        anyhow::bail!("preferences.low_threshold must be below preferences.high_threshold");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> String {
        r#"
[db]
path = "/tmp/campus.sqlite"

[chroma]
url = "http://127.0.0.1:8000"

[embedding]
model = "text-embedding-3-small"
"#
        .to_string()
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str(&minimal_toml()).unwrap();
        assert_eq!(config.chroma.collection, "campus_kg");
        assert_eq!(config.chroma.dims, 1536);
        assert!((config.retrieval.relevance_threshold - 0.75).abs() < 1e-9);
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.chat.history_limit, 10);
        assert_eq!(config.preferences.step, 15);
        assert!(config.connectors.listing.is_none());
        assert!(!config.connectors.fixture);
    }

    #[test]
    fn connector_sections_parse() {
        let toml_str = format!(
            "{}\n{}",
            minimal_toml(),
            r#"
[connectors]
fixture = true

[connectors.listing]
base_url = "https://cs.example.edu/tr/duyuru/goruntule/liste"
test_mode = true

[connectors.faq]
base_url = "https://faq.example.edu"
category_ids = "2,13,14"
"#
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        let listing = config.connectors.listing.unwrap();
        assert_eq!(listing.code, "listing");
        assert_eq!(listing.max_pages, 200);
        assert!(listing.test_mode);
        let faq = config.connectors.faq.unwrap();
        assert_eq!(faq.category_ids, "2,13,14");
        assert!(config.connectors.fixture);
    }

    #[test]
    fn invalid_thresholds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campus.toml");
        std::fs::write(
            &path,
            format!(
                "{}\n[preferences]\nhigh_threshold = 40\nlow_threshold = 60\n",
                minimal_toml()
            ),
        )
        .unwrap();
        assert!(load_config(&path).is_err());
    }
}
