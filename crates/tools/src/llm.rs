//! LLM Provider Abstraction
//!
//! Used by tools that need a model completion, such as Grafana dashboard generation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use rig::completion::Prompt;
use rig::providers::{anthropic, openai};

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: default_model("openai").to_string(),
            api_key: None,
        }
    }
}

/// Trait for LLM providers that can answer a prompt under a system preamble
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// OpenAI provider using Rig
pub struct OpenAIProvider {
    client: openai::Client,
    model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: openai::Client::new(api_key),
            model: model.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let agent = self.client.agent(&self.model).preamble(system).build();

        agent
            .prompt(prompt)
            .await
            .map_err(|e| Error::Llm(format!("OpenAI API error: {:?}", e)))
    }
}

/// Anthropic Claude provider using Rig
pub struct AnthropicProvider {
    client: anthropic::Client,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: anthropic::Client::new(
                api_key,
                "https://api.anthropic.com",
                None,
                anthropic::ANTHROPIC_VERSION_LATEST,
            ),
            model: model.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for AnthropicProvider {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(system)
            .max_tokens(8192)
            .build();

        agent
            .prompt(prompt)
            .await
            .map_err(|e| Error::Llm(format!("Anthropic API error: {:?}", e)))
    }
}

/// Stands in when no usable provider is configured; every call fails with the reason.
pub struct UnconfiguredProvider {
    reason: String,
}

impl UnconfiguredProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait::async_trait]
impl LLMProvider for UnconfiguredProvider {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
        Err(Error::Llm(self.reason.clone()))
    }
}

fn api_key(config: &LLMConfig, env_key: &str) -> Option<String> {
    config
        .api_key
        .clone()
        .or_else(|| std::env::var(env_key).ok())
        .filter(|k| !k.is_empty())
}

fn unconfigured(config: &LLMConfig, env_key: &str) -> Arc<dyn LLMProvider> {
    warn!("No API key for LLM provider '{}' (set LLM_API_KEY or {})", config.provider, env_key);
    Arc::new(UnconfiguredProvider::new(format!(
        "No API key configured for LLM provider '{}'",
        config.provider
    )))
}

/// Model used when `LLM_MODEL` is not set.
pub fn default_model(provider: &str) -> &'static str {
    match provider {
        "anthropic" | "claude" => anthropic::CLAUDE_3_5_SONNET,
        _ => openai::GPT_4O_MINI,
    }
}

/// Create a provider from configuration. Falls back to the provider's own API key variable.
pub fn create_provider(config: &LLMConfig) -> Arc<dyn LLMProvider> {
    match config.provider.as_str() {
        "openai" => match api_key(config, "OPENAI_API_KEY") {
            Some(key) => Arc::new(OpenAIProvider::new(&key, &config.model)),
            None => unconfigured(config, "OPENAI_API_KEY"),
        },
        "anthropic" | "claude" => match api_key(config, "ANTHROPIC_API_KEY") {
            Some(key) => Arc::new(AnthropicProvider::new(&key, &config.model)),
            None => unconfigured(config, "ANTHROPIC_API_KEY"),
        },
        other => {
            warn!("Unknown LLM provider '{}', model-backed tools will fail", other);
            Arc::new(UnconfiguredProvider::new(format!(
                "LLM provider '{}' is not supported",
                other
            )))
        }
    }
}
