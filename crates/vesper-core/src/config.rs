//! Environment-driven configuration
//!
//! Nothing here fails at process start. Missing provider credentials surface as
//! `Error::Configuration` the first time the gateway is used.

use std::env;

/// Embedding model used when `OPENAI_COMPATIBLE_EMBEDDING_MODEL` is unset
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Which AI backend the gateway builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    OpenAICompatible,
    Mock,
}

impl BackendKind {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "mock" => BackendKind::Mock,
            "openai_compatible" | "openai" => BackendKind::OpenAICompatible,
            other => {
                tracing::warn!(backend = %other, "Unknown AI_BACKEND, using openai_compatible");
                BackendKind::OpenAICompatible
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenAICompatible => "openai_compatible",
            BackendKind::Mock => "mock",
        }
    }
}

/// Inference provider settings
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub backend: BackendKind,
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub embedding_model: String,
}

impl ProviderConfig {
    /// Read provider settings from the environment
    ///
    /// - `AI_BACKEND`: `openai_compatible` (default) or `mock`
    /// - `OPENAI_COMPATIBLE_HOST`, `OPENAI_COMPATIBLE_API_KEY`, `OPENAI_COMPATIBLE_MODEL`
    /// - `OPENAI_COMPATIBLE_EMBEDDING_MODEL` (default: text-embedding-3-small)
    pub fn from_env() -> Self {
        Self {
            backend: env::var("AI_BACKEND")
                .map(|v| BackendKind::parse(&v))
                .unwrap_or_default(),
            host: non_empty_var("OPENAI_COMPATIBLE_HOST"),
            api_key: non_empty_var("OPENAI_COMPATIBLE_API_KEY"),
            model: non_empty_var("OPENAI_COMPATIBLE_MODEL"),
            embedding_model: non_empty_var("OPENAI_COMPATIBLE_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
        }
    }

    /// Settings for an OpenAI-compatible endpoint
    pub fn openai_compatible(host: &str, api_key: &str, model: &str) -> Self {
        Self {
            backend: BackendKind::OpenAICompatible,
            host: Some(host.to_string()),
            api_key: Some(api_key.to_string()),
            model: Some(model.to_string()),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    pub fn mock() -> Self {
        Self {
            backend: BackendKind::Mock,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            ..Default::default()
        }
    }

    /// Names of required settings that are missing for the selected backend
    pub fn missing(&self) -> Vec<&'static str> {
        if self.backend == BackendKind::Mock {
            return Vec::new();
        }
        let mut missing = Vec::new();
        if self.host.is_none() {
            missing.push("OPENAI_COMPATIBLE_HOST");
        }
        if self.api_key.is_none() {
            missing.push("OPENAI_COMPATIBLE_API_KEY");
        }
        if self.model.is_none() {
            missing.push("OPENAI_COMPATIBLE_MODEL");
        }
        missing
    }
}

/// Which row store implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Postgrest,
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgrest" | "supabase" => Ok(StoreKind::Postgrest),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("Unknown store '{}': use postgrest or memory", other)),
        }
    }
}

/// Row store settings
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub url: Option<String>,
    pub key: Option<String>,
}

impl StoreConfig {
    /// Read `VESPER_STORE`, `SUPABASE_URL` and `SUPABASE_KEY`
    pub fn from_env() -> Self {
        let kind = non_empty_var("VESPER_STORE")
            .and_then(|v| match v.parse() {
                Ok(kind) => Some(kind),
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            })
            .unwrap_or_default();

        Self {
            kind,
            url: non_empty_var("SUPABASE_URL"),
            key: non_empty_var("SUPABASE_KEY"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
