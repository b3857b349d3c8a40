//! AI provider integration.
//!
//! The planner and the optional sentiment scorer talk to a language model
//! through the [`AIProvider`] trait. [`AIManager`] holds a provider chain and
//! falls through to the next provider when one fails.

mod claude;
mod gemini;
mod ollama;

pub use claude::ClaudeProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

use async_trait::async_trait;

use crate::core::AiConfig;

/// Trait for AI providers.
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Send a system instruction and a user prompt, returning the reply text.
    async fn complete(&self, system: &str, prompt: &str) -> anyhow::Result<String>;

    /// Get the provider name.
    fn name(&self) -> &str;

    /// Check if the provider is available.
    async fn is_available(&self) -> bool;
}

/// AI error types.
#[derive(Debug, thiserror::Error)]
pub enum AIError {
    #[error("Provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("No response from AI")]
    NoResponse,
}

/// Reply from the provider chain.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Provider that answered
    pub provider: String,
    /// Reply text
    pub text: String,
}

/// AI provider manager with fallback support.
///
/// The configured provider is tried first, then any other provider that has
/// credentials (or, for Ollama, a reachable server).
pub struct AIManager {
    providers: Vec<Box<dyn AIProvider>>,
}

impl AIManager {
    /// Build the provider chain from configuration.
    pub async fn from_config(config: &AiConfig) -> Self {
        let preferred = config.provider.to_lowercase();
        let mut order = vec!["gemini", "claude", "ollama"];
        if let Some(pos) = order.iter().position(|p| *p == preferred) {
            let name = order.remove(pos);
            order.insert(0, name);
        } else {
            tracing::warn!(provider = %config.provider, "Unknown AI provider, using default order");
        }

        let mut providers: Vec<Box<dyn AIProvider>> = Vec::new();
        for name in order {
            let is_preferred = name == preferred;
            let model = if is_preferred { config.model.clone() } else { None };
            let base_url = if is_preferred { config.base_url.clone() } else { None };

            let provider: Option<Box<dyn AIProvider>> = match name {
                "gemini" => config.google_api_key.as_ref().map(|key| {
                    let mut p = GeminiProvider::new(key).with_temperature(config.temperature);
                    if let Some(m) = model {
                        p = p.with_model(m);
                    }
                    if let Some(url) = base_url {
                        p = p.with_base_url(url);
                    }
                    Box::new(p) as Box<dyn AIProvider>
                }),
                "claude" => config.anthropic_api_key.as_ref().map(|key| {
                    let mut p = ClaudeProvider::new(key).with_temperature(config.temperature);
                    if let Some(m) = model {
                        p = p.with_model(m);
                    }
                    if let Some(url) = base_url {
                        p = p.with_base_url(url);
                    }
                    Box::new(p) as Box<dyn AIProvider>
                }),
                _ => {
                    let mut p = OllamaProvider::new().with_temperature(config.temperature);
                    if let Some(m) = model {
                        p = p.with_model(m);
                    }
                    if let Some(url) = base_url {
                        p = p.with_base_url(url);
                    }
                    if p.is_available().await {
                        Some(Box::new(p) as Box<dyn AIProvider>)
                    } else {
                        tracing::debug!("Ollama not reachable, skipping");
                        None
                    }
                }
            };

            if let Some(p) = provider {
                providers.push(p);
            }
        }

        Self { providers }
    }

    /// Create with an explicit provider chain.
    pub fn with_providers(providers: Vec<Box<dyn AIProvider>>) -> Self {
        Self { providers }
    }

    /// Create with no providers. Every request fails.
    pub fn none() -> Self {
        Self { providers: Vec::new() }
    }

    /// Check if any AI provider is available.
    pub fn is_available(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Get the active provider name.
    pub fn active_provider(&self) -> Option<&str> {
        self.providers.first().map(|p| p.name())
    }

    /// Ask the chain for a completion, falling through on failure.
    pub async fn complete(&self, system: &str, prompt: &str) -> anyhow::Result<Completion> {
        for provider in &self.providers {
            match provider.complete(system, prompt).await {
                Ok(text) => {
                    return Ok(Completion { provider: provider.name().to_string(), text });
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "Provider failed, trying next");
                }
            }
        }

        Err(AIError::ProviderNotAvailable("No AI provider available".to_string()).into())
    }
}

/// Read an error body into an [`AIError`].
pub(crate) async fn api_error(provider: &str, response: reqwest::Response) -> AIError {
    let status = response.status().as_u16();
    if status == 429 {
        return AIError::RateLimited(provider.to_string());
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or(body);
    AIError::Api { status, message }
}
