//! Generation collaborator interface.
//!
//! The pipeline stops at a prompt and a ranked context list. Turning those
//! into an answer is delegated to a [`Generator`], typically a hosted or
//! local language model. Implementations live in the application crate.
//!
//! Failures (timeouts, auth, rate limits) are returned as opaque
//! [`anyhow::Error`]s. Callers do not retry on the generator's behalf.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::RetrievedContext;

/// Produces an answer from a prompt and the contexts it was built from.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short identifier for logs (e.g. `"extractive"`, `"openai:gpt-4o-mini"`).
    fn name(&self) -> &str;

    /// Answer `prompt`. `contexts` is the ranked list the prompt embeds,
    /// best first.
    async fn generate(&self, prompt: &str, contexts: &[RetrievedContext]) -> Result<String>;
}
