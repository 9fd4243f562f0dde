use super::{LLMError, LLMProvider, Message};
use crate::config::LLMConfig;
use crate::secrets::{scrub, SecretString};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// OpenAI-compatible chat completions endpoint
pub struct OpenAIProvider {
    config: LLMConfig,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// A provider without a key fails every call with `AuthenticationFailed`
    pub fn new(config: LLMConfig, api_key: Option<SecretString>) -> super::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LLMError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn generate(&self, messages: &[Message], model: &str) -> super::Result<Message> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            LLMError::AuthenticationFailed(format!(
                "Missing {}. Cannot contact the model",
                self.config.api_key_env
            ))
        })?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let api_messages: Vec<_> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content
                })
            })
            .collect();

        let payload = json!({
            "model": model,
            "messages": api_messages,
            "stream": false,
            "temperature": self.config.temperature,
        });

        debug!("Calling {} with {} messages", model, messages.len());
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key.unsecure()))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(scrub(&e.to_string()))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = scrub(&error_message(&text).unwrap_or_else(|| {
                format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                )
            }));
            warn!("Model endpoint returned {}: {}", status, message);

            return Err(match status.as_u16() {
                401 | 403 => LLMError::AuthenticationFailed(message),
                429 => LLMError::RateLimitExceeded,
                code => LLMError::Api {
                    status: code,
                    message,
                },
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let message = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| {
                LLMError::ParseError("Received invalid response structure".to_string())
            })?;

        // A message with null content (e.g. a refusal) is an empty reply
        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default();

        Ok(Message::assistant(content))
    }
}

/// Pull `error.message` (or a string `error`) out of an error body
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error": {"message": "bad model"}}"#),
            Some("bad model".to_string())
        );
        assert_eq!(
            error_message(r#"{"error": "quota"}"#),
            Some("quota".to_string())
        );
        assert_eq!(error_message("<html>"), None);
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let provider = OpenAIProvider::new(LLMConfig::default(), None).unwrap();
        let err = provider
            .generate(&[Message::user("hi")], "m")
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::AuthenticationFailed(ref m) if m.contains("CHUTES_API_KEY")));
    }
}
