//! Pluggable model backend abstraction
//!
//! This module provides a backend-agnostic interface for the one model call the
//! pipeline makes: turn a categorization prompt into a text reply.
//!
//! # Architecture
//!
//! - `AIBackend` trait: defines the interface for all backends
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `AnthropicBackend`, `OllamaBackend`,
//!   `OpenAICompatibleBackend`, `MockBackend`
//! - `AICategorizer`: prompt building, retries and response validation
//!
//! # Configuration
//!
//! The backend kind comes from `[model] backend`, overridden by `AI_BACKEND`.
//! Hosts and secrets are only read from the environment:
//! - `ANTHROPIC_API_KEY` (or `AI_API_KEY`): required for anthropic
//! - `ANTHROPIC_HOST`: API base URL (default: https://api.anthropic.com)
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama)
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)
//! - `ANTHROPIC_MODEL`, `OLLAMA_MODEL`, `OPENAI_COMPATIBLE_MODEL`: model overrides
//!
//! Missing required settings mean "no backend": the model stage is skipped.

mod anthropic;
pub mod categorizer;
pub(crate) mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use anthropic::AnthropicBackend;
pub use categorizer::{AICategorizer, CategorizerReport};
pub use mock::{MockBackend, MockRule};
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{info, warn};

use crate::config::{BackendKind, ModelConfig};
use crate::error::{Error, Result};

/// Trait defining the interface for all model backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Send one prompt and return the model's raw text reply
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Sampling settings shared by the HTTP backends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl From<&ModelConfig> for GenerationSettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Backend-related environment variables, read once
#[derive(Debug, Clone, Default)]
pub struct BackendEnv {
    pub backend: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_host: Option<String>,
    pub anthropic_model: Option<String>,
    pub ollama_host: Option<String>,
    pub ollama_model: Option<String>,
    pub openai_host: Option<String>,
    pub openai_model: Option<String>,
    pub openai_api_key: Option<String>,
}

impl BackendEnv {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            backend: var("AI_BACKEND"),
            anthropic_api_key: var("ANTHROPIC_API_KEY").or_else(|| var("AI_API_KEY")),
            anthropic_host: var("ANTHROPIC_HOST"),
            anthropic_model: var("ANTHROPIC_MODEL"),
            ollama_host: var("OLLAMA_HOST"),
            ollama_model: var("OLLAMA_MODEL"),
            openai_host: var("OPENAI_COMPATIBLE_HOST"),
            openai_model: var("OPENAI_COMPATIBLE_MODEL"),
            openai_api_key: var("OPENAI_COMPATIBLE_API_KEY"),
        }
    }
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// Anthropic Messages API
    Anthropic(AnthropicBackend),
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// OpenAI-compatible backend (vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create a client from config plus environment variables
    ///
    /// Returns `Ok(None)` when the selected backend is missing its host or key.
    pub fn from_config(config: &ModelConfig) -> Result<Option<Self>> {
        Self::from_parts(config, &BackendEnv::from_env())
    }

    /// Create a client from config and an explicit environment snapshot
    pub fn from_parts(config: &ModelConfig, env: &BackendEnv) -> Result<Option<Self>> {
        let kind = match env.backend.as_deref() {
            Some(name) => match name.parse::<BackendKind>() {
                Ok(kind) => kind,
                Err(_) => {
                    warn!(backend = %name, fallback = %config.backend, "Unknown AI_BACKEND, using configured backend");
                    config.backend
                }
            },
            None => config.backend,
        };

        // The configured model only applies to the configured backend
        let configured_model = (kind == config.backend).then(|| config.model.clone());

        let client = match kind {
            BackendKind::Anthropic => {
                let Some(api_key) = env.anthropic_api_key.as_deref() else {
                    info!("ANTHROPIC_API_KEY not set, model categorization disabled");
                    return Ok(None);
                };
                let host = env
                    .anthropic_host
                    .as_deref()
                    .unwrap_or(anthropic::DEFAULT_HOST);
                let model = env
                    .anthropic_model
                    .clone()
                    .or(configured_model)
                    .unwrap_or_else(|| anthropic::DEFAULT_MODEL.to_string());
                AIClient::Anthropic(AnthropicBackend::new(host, &model, api_key, config)?)
            }
            BackendKind::Ollama => {
                let Some(host) = env.ollama_host.as_deref() else {
                    info!("OLLAMA_HOST not set, model categorization disabled");
                    return Ok(None);
                };
                let model = env
                    .ollama_model
                    .clone()
                    .or(configured_model)
                    .unwrap_or_else(|| ollama::DEFAULT_MODEL.to_string());
                AIClient::Ollama(OllamaBackend::new(host, &model, config)?)
            }
            BackendKind::OpenAICompatible => {
                let Some(host) = env.openai_host.as_deref() else {
                    info!("OPENAI_COMPATIBLE_HOST not set, model categorization disabled");
                    return Ok(None);
                };
                let model = env
                    .openai_model
                    .clone()
                    .or(configured_model)
                    .unwrap_or_else(|| openai_compatible::DEFAULT_MODEL.to_string());
                let mut backend = OpenAICompatibleBackend::new(host, &model, config)?;
                if let Some(key) = env.openai_api_key.as_deref() {
                    backend = backend.with_api_key(key);
                }
                AIClient::OpenAICompatible(backend)
            }
            BackendKind::Mock => AIClient::Mock(MockBackend::new()),
        };

        info!(backend = %client.kind(), model = %client.model(), host = %client.host(), "Model backend configured");
        Ok(Some(client))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            AIClient::Anthropic(_) => BackendKind::Anthropic,
            AIClient::Ollama(_) => BackendKind::Ollama,
            AIClient::OpenAICompatible(_) => BackendKind::OpenAICompatible,
            AIClient::Mock(_) => BackendKind::Mock,
        }
    }

    pub fn info(&self) -> BackendInfo {
        BackendInfo {
            backend: self.kind().to_string(),
            model: self.model().to_string(),
            host: self.host().to_string(),
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        match self {
            AIClient::Anthropic(b) => b.complete(system, prompt).await,
            AIClient::Ollama(b) => b.complete(system, prompt).await,
            AIClient::OpenAICompatible(b) => b.complete(system, prompt).await,
            AIClient::Mock(b) => b.complete(system, prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Anthropic(b) => b.health_check().await,
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Anthropic(b) => b.model(),
            AIClient::Ollama(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Anthropic(b) => b.host(),
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

/// HTTP client with the configured request timeout
fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Map a non-success HTTP status to an error
///
/// Rate limiting and server errors are retryable; other statuses are not.
fn status_error(api: &str, status: StatusCode, body: &str) -> Error {
    let body: String = body.chars().take(300).collect();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Error::Model(format!("{} API error {}: {}", api, status, body))
    } else {
        Error::InvalidData(format!("{} API error {}: {}", api, status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend: BackendKind) -> ModelConfig {
        ModelConfig {
            backend,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_missing_key_means_no_backend() {
        let client = AIClient::from_parts(&config(BackendKind::Anthropic), &BackendEnv::default())
            .unwrap();
        assert!(client.is_none());
    }

    #[test]
    fn test_anthropic_from_env() {
        let env = BackendEnv {
            anthropic_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let client = AIClient::from_parts(&config(BackendKind::Anthropic), &env)
            .unwrap()
            .unwrap();
        assert_eq!(client.kind(), BackendKind::Anthropic);
        assert_eq!(client.model(), "claude-3-haiku-20240307");
        assert_eq!(client.host(), "https://api.anthropic.com");
    }

    #[test]
    fn test_ai_backend_env_overrides_config() {
        let env = BackendEnv {
            backend: Some("ollama".to_string()),
            ollama_host: Some("http://localhost:11434/".to_string()),
            ..Default::default()
        };
        let client = AIClient::from_parts(&config(BackendKind::Anthropic), &env)
            .unwrap()
            .unwrap();
        assert_eq!(client.kind(), BackendKind::Ollama);
        // Configured claude model does not leak into another backend
        assert_eq!(client.model(), "llama3.2");
        assert_eq!(client.host(), "http://localhost:11434");
    }

    #[test]
    fn test_unknown_ai_backend_falls_back_to_config() {
        let env = BackendEnv {
            backend: Some("skynet".to_string()),
            ..Default::default()
        };
        let client = AIClient::from_parts(&config(BackendKind::Mock), &env)
            .unwrap()
            .unwrap();
        assert_eq!(client.kind(), BackendKind::Mock);
    }

    #[test]
    fn test_openai_requires_host() {
        let env = BackendEnv {
            openai_api_key: Some("key".to_string()),
            ..Default::default()
        };
        assert!(
            AIClient::from_parts(&config(BackendKind::OpenAICompatible), &env)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_status_error_classification() {
        assert!(status_error("X", StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(status_error("X", StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(!status_error("X", StatusCode::UNAUTHORIZED, "bad key").is_transient());
    }
}
