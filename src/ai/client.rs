//! OpenRouter API client

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{GenerationOptions, TextGenerator};
use crate::config::AiConfig;
use crate::constants::HTTP_TIMEOUT_SECS;
use crate::retry::{RetryConfig, Retryable, with_retry};

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("failed to reach language model: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("language model API error ({status}): {body}")]
    Api { status: StatusCode, body: String },
    #[error("no response content from language model")]
    EmptyResponse,
}

impl Retryable for AiError {
    fn is_retryable(&self) -> bool {
        match self {
            AiError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AiError::Api { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            AiError::EmptyResponse => false,
        }
    }
}

/// OpenRouter-compatible chat completions client
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    retry: RetryConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenRouterClient {
    pub fn new(api_key: String, config: &AiConfig) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: config.base_url.clone(),
            retry: RetryConfig::with_max_retries(config.max_retries),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one chat completion request
    async fn complete_once(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, AiError> {
        let request = build_request(&self.model, system_prompt, user_prompt, options);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "https://github.com/zero-assist")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api { status, body });
        }

        let chat_response: ChatResponse = response.json().await?;
        first_content(chat_response)
    }
}

impl TextGenerator for OpenRouterClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, AiError> {
        tracing::info!(
            "Requesting completion from {} (max_tokens={}, temperature={})",
            self.model,
            options.max_tokens,
            options.temperature
        );
        with_retry(&self.retry, "Completion request", || {
            self.complete_once(system_prompt, user_prompt, options)
        })
        .await
    }
}

fn build_request<'a>(
    model: &'a str,
    system_prompt: &'a str,
    user_prompt: &'a str,
    options: &GenerationOptions,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: [
            Message {
                role: "system",
                content: system_prompt,
            },
            Message {
                role: "user",
                content: user_prompt,
            },
        ],
        max_tokens: options.max_tokens,
        temperature: options.temperature,
        frequency_penalty: options.frequency_penalty,
        presence_penalty: options.presence_penalty,
    }
}

fn first_content(response: ChatResponse) -> Result<String, AiError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(AiError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_unset_penalties() {
        let options = GenerationOptions::new(300, 0.0);
        let request = build_request("m", "sys", "user", &options);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "user");
        assert_eq!(json["max_tokens"], 300);
        assert!(json.get("frequency_penalty").is_none());
        assert!(json.get("presence_penalty").is_none());
    }

    #[test]
    fn test_request_includes_penalties() {
        let options = GenerationOptions::new(300, 0.5).with_penalties(Some(0.5), Some(0.25));
        let json = serde_json::to_value(build_request("m", "s", "u", &options)).unwrap();
        assert_eq!(json["frequency_penalty"], 0.5);
        assert_eq!(json["presence_penalty"], 0.25);
    }

    #[test]
    fn test_first_content() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Hello"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_content(response).unwrap(), "Hello");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_content(empty), Err(AiError::EmptyResponse)));

        let null: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(matches!(first_content(null), Err(AiError::EmptyResponse)));
    }

    #[test]
    fn test_retry_classification() {
        let server = AiError::Api {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        let limited = AiError::Api {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
        };
        let unauthorized = AiError::Api {
            status: StatusCode::UNAUTHORIZED,
            body: "bad key".to_string(),
        };
        assert!(server.is_retryable());
        assert!(limited.is_retryable());
        assert!(!unauthorized.is_retryable());
        assert!(!AiError::EmptyResponse.is_retryable());
    }
}
