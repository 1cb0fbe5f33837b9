//! Answer generators.
//!
//! Two implementations of [`Generator`]:
//!
//! - [`ExtractiveGenerator`] works offline: it quotes the best-ranked
//!   context back to the user. Useful for demos and tests.
//! - [`ChatCompletionsGenerator`] sends the prompt to any OpenAI-compatible
//!   `POST {base_url}/chat/completions` endpoint. The `openai` and `qwen`
//!   providers differ only in their default base URL and API key variable.
//!
//! Remote calls are made exactly once. Timeouts, HTTP errors, and malformed
//! responses come back as errors for the caller to handle.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use rag_harness_core::generate::Generator;
use rag_harness_core::models::RetrievedContext;

use crate::config::GenerationConfig;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
const QWEN_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
const QWEN_KEY_ENV: &str = "DASHSCOPE_API_KEY";

/// Characters of the best context quoted by [`ExtractiveGenerator`].
const EXTRACT_CHARS: usize = 200;

pub const NO_CONTEXT_ANSWER: &str =
    "Sorry, no relevant documents were found to answer your question.";

/// Build the generator named by `config.provider`.
///
/// Remote providers read their API key from the environment here, so a
/// missing key fails before any question is asked.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "extractive" => Ok(Box::new(ExtractiveGenerator)),
        "openai" | "qwen" => {
            let (default_url, default_env) = if config.provider == "openai" {
                (OPENAI_BASE_URL, OPENAI_KEY_ENV)
            } else {
                (QWEN_BASE_URL, QWEN_KEY_ENV)
            };
            let model = config
                .model
                .as_deref()
                .filter(|m| !m.is_empty())
                .with_context(|| format!("generation.model required for '{}'", config.provider))?;
            let key_env = config.api_key_env.as_deref().unwrap_or(default_env);
            let api_key = std::env::var(key_env)
                .map_err(|_| anyhow::anyhow!("{} not set", key_env))?;

            Ok(Box::new(ChatCompletionsGenerator::new(
                &config.provider,
                config.base_url.as_deref().unwrap_or(default_url),
                model,
                &api_key,
                config.temperature,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        other => bail!(
            "Unknown generation provider: '{}'. Must be extractive, openai, or qwen.",
            other
        ),
    }
}

// ============ Extractive ============

/// Quotes the top context instead of calling a model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveGenerator;

#[async_trait]
impl Generator for ExtractiveGenerator {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn generate(&self, _prompt: &str, contexts: &[RetrievedContext]) -> Result<String> {
        let Some(best) = contexts.first() else {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        };

        let excerpt: String = best.text().chars().take(EXTRACT_CHARS).collect();
        let source = best
            .source()
            .map(|s| format!("\n\nSource: {}", s))
            .unwrap_or_default();
        Ok(format!(
            "Based on the reference documents, here is the relevant information:\n\n\
             {}...{}\n\n\
             (This answer quotes the best-matching passage; configure a language model \
             provider for a generated answer.)",
            excerpt, source
        ))
    }
}

// ============ Chat completions ============

/// Client for an OpenAI-compatible chat-completions API.
pub struct ChatCompletionsGenerator {
    name: String,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
}

impl ChatCompletionsGenerator {
    pub fn new(
        provider: &str,
        base_url: &str,
        model: &str,
        api_key: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: format!("{}:{}", provider, model),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key: api_key.to_string(),
            temperature,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, contexts: &[RetrievedContext]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "user", "content": prompt },
            ],
        });

        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            contexts = contexts.len(),
            "requesting chat completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("{} API error {}: {}", self.name, status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| {
            anyhow::anyhow!("Invalid chat completion response: missing choices[0].message.content")
        })
}
