//! Inference provider abstraction
//!
//! # Architecture
//!
//! - `AIBackend` trait: the two provider operations, `complete` and `embed`
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - `ModelGateway`: the single shared handle the rest of the crate uses. It
//!   builds its `AIClient` lazily, on first use, from `ProviderConfig`.
//! - `contract`: normalization and validation of raw model output
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (openai_compatible, mock). Default: openai_compatible
//! - `OPENAI_COMPATIBLE_HOST`: Provider base URL (required)
//! - `OPENAI_COMPATIBLE_API_KEY`: Bearer key (required)
//! - `OPENAI_COMPATIBLE_MODEL`: Chat model name (required)
//! - `OPENAI_COMPATIBLE_EMBEDDING_MODEL`: Embedding model (default: text-embedding-3-small)

pub mod contract;
mod gateway;
mod mock;
mod openai_compatible;

pub use gateway::ModelGateway;
pub use mock::MockBackend;
#[cfg(any(test, feature = "test-utils"))]
pub(crate) use mock::hashed_embedding;
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;

use crate::config::{BackendKind, ProviderConfig};
use crate::error::{Error, Result};

/// Trait defining the interface for all AI backends
///
/// Implementations surface every failure unchanged. There is no retry at this
/// layer.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Run one chat completion and return the raw assistant text
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String>;

    /// Embed `text` into a vector of `dims` floats
    async fn embed(&self, text: &str, dims: usize) -> Result<Vec<f32>>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Chat model name (for logging)
    fn model(&self) -> &str;

    /// Host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// Any server implementing the OpenAI chat completions and embeddings API
    OpenAICompatible(OpenAICompatibleBackend),
    /// Scripted backend for tests and local development
    Mock(MockBackend),
}

impl AIClient {
    /// Build a client from provider settings
    ///
    /// Fails with `Error::Configuration` if the selected backend is missing
    /// its endpoint, key or model.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        match config.backend {
            BackendKind::Mock => Ok(AIClient::Mock(MockBackend::new())),
            BackendKind::OpenAICompatible => {
                let missing = config.missing();
                if !missing.is_empty() {
                    return Err(Error::Configuration(format!(
                        "missing {}",
                        missing.join(", ")
                    )));
                }
                let (Some(host), Some(api_key), Some(model)) =
                    (&config.host, &config.api_key, &config.model)
                else {
                    return Err(Error::Configuration("incomplete provider settings".into()));
                };
                Ok(AIClient::OpenAICompatible(
                    OpenAICompatibleBackend::with_api_key(host, model, api_key)
                        .with_embedding_model(&config.embedding_model),
                ))
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.complete(system_prompt, user_prompt, temperature).await,
            AIClient::Mock(b) => b.complete(system_prompt, user_prompt, temperature).await,
        }
    }

    async fn embed(&self, text: &str, dims: usize) -> Result<Vec<f32>> {
        match self {
            AIClient::OpenAICompatible(b) => b.embed(text, dims).await,
            AIClient::Mock(b) => b.embed(text, dims).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
