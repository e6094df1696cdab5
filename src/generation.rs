//! Chat-completion client for the generation gateway.
//!
//! Stateless single-turn call: all conversational state lives in the
//! prompt text, so the request is one system-less user message against
//! an OpenAI-compatible `/v1/chat/completions` endpoint.

use anyhow::Result;
use serde_json::Value;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::GenerationError;

pub struct GenerationClient {
    config: GenerationConfig,
    http: reqwest::Client,
}

impl GenerationClient {
    pub fn new(config: GenerationConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client");
        Self { config, http }
    }

    fn api_key(&self) -> Result<String, GenerationError> {
        std::env::var(&self.config.api_key_env).map_err(|_| {
            GenerationError::Malformed(format!(
                "{} environment variable not set",
                self.config.api_key_env
            ))
        })
    }

    /// Send one prompt, return the model's text.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| GenerationError::Malformed(format!("invalid json: {}", e)))?;
        extract_message(&json)
    }
}

fn extract_message(json: &Value) -> Result<String, GenerationError> {
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| GenerationError::Malformed("missing choices[0].message.content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_extraction() {
        let json = json!({
            "choices": [{"message": {"role": "assistant", "content": "  Merhaba.  "}}]
        });
        assert_eq!(extract_message(&json).unwrap(), "Merhaba.");
    }

    #[test]
    fn missing_content_is_malformed() {
        assert!(extract_message(&json!({"choices": []})).is_err());
    }
}
