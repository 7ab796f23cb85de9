//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions and
//! embeddings API: OpenAI itself, Azure-style gateways, vLLM, LocalAI,
//! llama-server and similar.
//!
//! Completions always request `response_format: {"type": "json_object"}`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DEFAULT_EMBEDDING_MODEL;
use crate::error::{Error, Result};

use super::contract::excerpt;
use super::AIBackend;

/// OpenAI-compatible backend
///
/// ```rust,ignore
/// export OPENAI_COMPATIBLE_HOST="https://api.openai.com"
/// export OPENAI_COMPATIBLE_API_KEY="sk-..."
/// export OPENAI_COMPATIBLE_MODEL="gpt-4o-mini"
/// ```
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    embedding_model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    ///
    /// A trailing `/v1` on the base URL is accepted and stripped.
    pub fn new(base_url: &str, model: &str) -> Self {
        let trimmed = base_url.trim_end_matches('/');
        let base_url = trimmed.strip_suffix("/v1").unwrap_or(trimmed);
        Self {
            http_client: Client::new(),
            base_url: base_url.to_string(),
            model: model.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        let mut backend = Self::new(base_url, model);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Use a different embedding model
    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn authorized(&self, req_builder: RequestBuilder) -> RequestBuilder {
        match self.api_key {
            Some(ref api_key) => req_builder.header("Authorization", format!("Bearer {}", api_key)),
            None => req_builder,
        }
    }

    /// Turn a non-success status into a transport error with a bounded body excerpt
    async fn check_status(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Transport(format!(
            "Provider error {}: {}",
            status,
            excerpt(&body)
        )))
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI embeddings request
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            stream: false,
        };

        let req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        let response = Self::check_status(self.authorized(req_builder).send().await?).await?;
        let chat_response: ChatCompletionResponse = response.json().await?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Transport("No completion in provider response".into()))?;

        debug!(model = %self.model, chars = content.len(), "Completion received");
        Ok(content)
    }

    async fn embed(&self, text: &str, dims: usize) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
            dimensions: dims,
        };

        let req_builder = self
            .http_client
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&request);

        let response = Self::check_status(self.authorized(req_builder).send().await?).await?;
        let embedding_response: EmbeddingResponse = response.json().await?;

        let embedding = embedding_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Transport("No embedding in provider response".into()))?;

        debug!(model = %self.embedding_model, dims = embedding.len(), "Embedding received");
        Ok(embedding)
    }

    async fn health_check(&self) -> bool {
        let req_builder = self.http_client.get(format!("{}/v1/models", self.base_url));
        match self.authorized(req_builder).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
