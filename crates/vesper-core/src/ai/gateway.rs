//! Shared model client gateway

use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::config::ProviderConfig;
use crate::error::Result;

use super::{AIBackend, AIClient};

/// Single shared adapter to the inference provider
///
/// Cloning is cheap: every clone shares one lazily built `AIClient`. The client
/// is constructed on first use, so a process with missing credentials starts
/// fine and reports `Error::Configuration` only when analysis is attempted.
#[derive(Clone)]
pub struct ModelGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    config: ProviderConfig,
    client: OnceLock<AIClient>,
}

impl ModelGateway {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                config,
                client: OnceLock::new(),
            }),
        }
    }

    /// Gateway configured from `AI_BACKEND` and `OPENAI_COMPATIBLE_*`
    pub fn from_env() -> Self {
        Self::new(ProviderConfig::from_env())
    }

    /// Gateway around an already built client (tests, mock servers)
    pub fn with_client(client: AIClient) -> Self {
        let gateway = Self::new(ProviderConfig::default());
        let _ = gateway.inner.client.set(client);
        gateway
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.inner.config
    }

    /// Whether the client has been built yet
    pub fn is_initialized(&self) -> bool {
        self.inner.client.get().is_some()
    }

    /// The shared client, built on first call
    pub fn client(&self) -> Result<&AIClient> {
        if let Some(client) = self.inner.client.get() {
            return Ok(client);
        }

        let client = AIClient::from_config(&self.inner.config)?;
        info!(
            backend = self.inner.config.backend.as_str(),
            host = client.host(),
            model = client.model(),
            "AI client initialized"
        );
        // A concurrent first call may have won the race; either client is equivalent
        Ok(self.inner.client.get_or_init(|| client))
    }

    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String> {
        self.client()?
            .complete(system_prompt, user_prompt, temperature)
            .await
    }

    pub async fn embed(&self, text: &str, dims: usize) -> Result<Vec<f32>> {
        self.client()?.embed(text, dims).await
    }

    /// False when unconfigured or unreachable
    pub async fn health_check(&self) -> bool {
        match self.client() {
            Ok(client) => client.health_check().await,
            Err(_) => false,
        }
    }
}
