/// Client for an OpenAI-compatible chat completions endpoint.
///
/// The SEO pipeline only needs single-turn, non-streaming completions. When the
/// host supports web search (`web_search_options`), the assistant message
/// carries `url_citation` annotations which are surfaced as citations.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;
use crate::http::{env_u64, parse_json_response, UpstreamError};
use crate::retry::RetryPolicy;

#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub web_search: bool,
    pub default_timeout: Duration,
    pub retry: RetryPolicy,
    pub max_error_body_bytes: usize,
}

impl OpenAiClientConfig {
    pub fn from_env() -> Result<Self, CommonError> {
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let model = std::env::var("OPENAI_MODEL")
            .map_err(|_| CommonError::MissingConfig("OPENAI_MODEL"))?;

        let temperature = match std::env::var("OPENAI_TEMPERATURE") {
            Ok(raw) => Some(raw.parse::<f32>().map_err(|_| CommonError::InvalidConfig {
                name: "OPENAI_TEMPERATURE",
                value: raw.clone(),
            })?),
            Err(_) => None,
        };

        let web_search = std::env::var("OPENAI_WEB_SEARCH")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            model,
            temperature,
            web_search,
            default_timeout: Duration::from_secs(env_u64("OPENAI_TIMEOUT_SECS", 120)),
            retry: RetryPolicy::from_env("OPENAI"),
            max_error_body_bytes: env_u64("OPENAI_MAX_ERROR_BODY_BYTES", 8 * 1024) as usize,
        })
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiClientConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, CommonError> {
        let http = reqwest::Client::builder()
            .user_agent("seo-analyzer/openai")
            .build()?;
        Ok(Self { config, http })
    }

    /// Build a single-turn request for the configured model.
    pub fn prompt_request(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.config.temperature,
            web_search_options: self.config.web_search.then(|| serde_json::json!({})),
        }
    }

    pub async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, UpstreamError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let timeout = self.config.default_timeout;
        self.config
            .retry
            .run("openai", || {
                let req = request.clone();
                let url = url.clone();
                async move {
                    let mut builder = self.http.post(&url).timeout(timeout).json(&req);
                    if let Some(key) = &self.config.api_key {
                        builder = builder.bearer_auth(key);
                    }
                    let resp = builder.send().await?;
                    parse_json_response(resp, self.config.max_error_body_bytes).await
                }
            })
            .await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_options: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
}

impl ChatCompletionResponse {
    /// The first choice's message, which is the only one requested.
    pub fn first_message(&self) -> Option<&ChatCompletionMessage> {
        self.choices.first().map(|c| &c.message)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub annotations: Option<Vec<MessageAnnotation>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageAnnotation {
    #[serde(rename = "type")]
    pub kind: String,
    pub url_citation: Option<UrlCitation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UrlCitation {
    pub url: Option<String>,
    pub title: Option<String>,
}
