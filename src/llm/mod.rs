//! LLM integration for Custos.
//!
//! Supports any OpenAI-compatible chat-completions endpoint:
//! - **OpenRouter** (default)
//! - **OpenAI**
//!
//! `OpenRouterClient` performs one HTTP exchange per call and classifies the
//! reply through [`Envelope`]. Retrying lives in [`retry`].

pub mod envelope;
pub mod openrouter;
pub mod provider;
pub mod retry;

pub use envelope::{Envelope, EnvelopeMeta};
pub use openrouter::OpenRouterClient;
pub use provider::*;
pub use retry::{RetryPolicy, complete_with_retry};

use std::sync::Arc;
use std::time::Duration;

use crate::config::{env_parse, env_string};
use crate::error::{ConfigError, LlmError};

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenRouter,
    OpenAi,
}

impl LlmBackend {
    fn default_endpoint(self) -> &'static str {
        match self {
            Self::OpenRouter => openrouter::OPENROUTER_API_URL,
            Self::OpenAi => openrouter::OPENAI_API_URL,
        }
    }

    fn provider_name(self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::OpenAi => "openai",
        }
    }
}

impl std::str::FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(Self::OpenRouter),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    /// Overrides the backend's default endpoint.
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

impl LlmConfig {
    /// Read the LLM settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the LLM settings through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = env_string(&lookup, "OPENROUTER_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let backend = env_parse(&lookup, "CUSTOS_LLM_BACKEND", LlmBackend::OpenRouter)?;
        let model = env_string(&lookup, "CUSTOS_MODEL")
            .unwrap_or_else(|| openrouter::DEFAULT_MODEL.to_string());
        let endpoint = env_string(&lookup, "CUSTOS_LLM_ENDPOINT");
        let timeout_secs = env_parse(
            &lookup,
            "CUSTOS_LLM_TIMEOUT_SECS",
            openrouter::DEFAULT_TIMEOUT.as_secs(),
        )?;

        Ok(Self {
            backend,
            api_key: secrecy::SecretString::from(api_key),
            model,
            endpoint,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// The URL requests are sent to.
    pub fn endpoint_url(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.backend.default_endpoint())
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let client = OpenRouterClient::with_endpoint(
        config.api_key.clone(),
        &config.model,
        config.endpoint_url(),
        config.timeout,
    )?
    .with_provider_name(config.backend.provider_name());

    tracing::info!(
        backend = config.backend.provider_name(),
        endpoint = config.endpoint_url(),
        "Using model {}",
        config.model
    );
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_with_only_api_key() {
        let config = LlmConfig::from_lookup(lookup(&[("OPENROUTER_API_KEY", "sk-or")])).unwrap();
        assert_eq!(config.backend, LlmBackend::OpenRouter);
        assert_eq!(config.model, openrouter::DEFAULT_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.endpoint_url(), openrouter::OPENROUTER_API_URL);
    }

    #[test]
    fn missing_api_key_is_reported() {
        let err = LlmConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "OPENROUTER_API_KEY"));
    }

    #[test]
    fn openai_backend_and_overrides() {
        let config = LlmConfig::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk"),
            ("CUSTOS_LLM_BACKEND", "OpenAI"),
            ("CUSTOS_MODEL", "gpt-4o-mini"),
            ("CUSTOS_LLM_TIMEOUT_SECS", "15"),
        ]))
        .unwrap();
        assert_eq!(config.backend, LlmBackend::OpenAi);
        assert_eq!(config.endpoint_url(), openrouter::OPENAI_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(15));

        let config = LlmConfig::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk"),
            ("CUSTOS_LLM_ENDPOINT", "http://localhost:8000/v1/chat/completions"),
        ]))
        .unwrap();
        assert_eq!(
            config.endpoint_url(),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let err = LlmConfig::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk"),
            ("CUSTOS_LLM_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CUSTOS_LLM_TIMEOUT_SECS"));
    }

    #[test]
    fn create_provider_uses_configured_model() {
        let config = LlmConfig {
            backend: LlmBackend::OpenRouter,
            api_key: secrecy::SecretString::from("test-key"),
            model: "deepseek/deepseek-r1-zero:free".to_string(),
            endpoint: None,
            timeout: Duration::from_secs(60),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "deepseek/deepseek-r1-zero:free");
    }
}
