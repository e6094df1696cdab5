//! Optional emotion classifier client.
//!
//! The classifier is a side signal: one directive line in the prompt.
//! It is never allowed to fail a question, so every failure path (no
//! endpoint configured, network error, unexpected payload) degrades to
//! [`Emotion::Unknown`].

use serde_json::Value;
use std::time::Duration;

use crate::config::EmotionConfig;
use crate::models::Emotion;

pub struct EmotionClient {
    config: EmotionConfig,
    http: reqwest::Client,
}

impl EmotionClient {
    pub fn new(config: EmotionConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client");
        Self { config, http }
    }

    /// Classify the user's utterance. Never fails.
    pub async fn predict(&self, text: &str) -> Emotion {
        let Some(url) = self.config.url.as_deref() else {
            return Emotion::Unknown;
        };

        let body = serde_json::json!({"text": text});
        let resp = match self.http.post(url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                eprintln!("emotion: request failed: {}", e);
                return Emotion::Unknown;
            }
        };

        if !resp.status().is_success() {
            eprintln!("emotion: classifier returned HTTP {}", resp.status());
            return Emotion::Unknown;
        }

        match resp.json::<Value>().await {
            Ok(json) => extract_label(&json)
                .map(|label| Emotion::from_label(&label))
                .unwrap_or(Emotion::Unknown),
            Err(e) => {
                eprintln!("emotion: unreadable response: {}", e);
                Emotion::Unknown
            }
        }
    }
}

/// The classifier has answered with either `label` or `emotion` keys
/// across deployments.
fn extract_label(json: &Value) -> Option<String> {
    json.get("label")
        .or_else(|| json.get("emotion"))
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn label_extraction_from_both_keys() {
        assert_eq!(
            extract_label(&json!({"label": "SAD"})).as_deref(),
            Some("SAD")
        );
        assert_eq!(
            extract_label(&json!({"emotion": "happy"})).as_deref(),
            Some("happy")
        );
        assert!(extract_label(&json!({"score": 0.9})).is_none());
    }

    #[tokio::test]
    async fn unconfigured_endpoint_is_unknown() {
        let client = EmotionClient::new(EmotionConfig::default());
        assert_eq!(client.predict("çok üzgünüm").await, Emotion::Unknown);
    }
}
