//! Question answering over a shared pipeline.
//!
//! A [`QaSession`] runs retrieve → prompt → generate for each question and,
//! when enabled, records every turn in a [`ConversationHistory`].

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use rag_harness_core::generate::Generator;
use rag_harness_core::index::Metric;
use rag_harness_core::models::RetrievedContext;

use crate::config::Config;
use crate::generation::create_generator;
use crate::history::{ConversationHistory, ExportFormat, Turn};
use crate::shared::SharedPipeline;

/// Result of one [`QaSession::ask`].
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    /// Contexts the answer was grounded on, best first.
    pub contexts: Vec<RetrievedContext>,
    pub prompt: String,
}

pub struct QaSession {
    shared: Arc<SharedPipeline>,
    generator: Box<dyn Generator>,
    top_k: usize,
    metric: Metric,
    history_enabled: bool,
    history: ConversationHistory,
}

impl QaSession {
    pub fn new(
        shared: Arc<SharedPipeline>,
        generator: Box<dyn Generator>,
        top_k: usize,
        history_enabled: bool,
    ) -> Self {
        Self {
            shared,
            generator,
            top_k,
            metric: Metric::default(),
            history_enabled,
            history: ConversationHistory::new(),
        }
    }

    /// Session configured from `[retrieval]`, `[generation]` and `[history]`.
    pub fn from_config(config: &Config, shared: Arc<SharedPipeline>) -> Result<Self> {
        let generator = create_generator(&config.generation)?;
        Ok(Self::new(
            shared,
            generator,
            config.retrieval.top_k,
            config.history.enabled,
        )
        .with_metric(config.retrieval.metric()?))
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn export_history(&self, dir: &std::path::Path, format: ExportFormat) -> Result<PathBuf> {
        self.history.export(dir, format)
    }

    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            bail!("Question must not be empty");
        }

        let pipeline = self.shared.snapshot();
        let contexts = pipeline.retrieve_with_metric(question, self.top_k, self.metric)?;
        let prompt = pipeline.build_prompt(question, &contexts);
        debug!(
            contexts = contexts.len(),
            generator = self.generator.name(),
            "answering question"
        );

        let answer = self.generator.generate(&prompt, &contexts).await?;

        if self.history_enabled {
            self.history.push(Turn::new(question, &answer, &contexts));
        }

        Ok(Answer {
            answer,
            contexts,
            prompt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ExtractiveGenerator;
    use rag_harness_core::chunk::ChunkConfig;
    use rag_harness_core::embedding::Embedder;
    use rag_harness_core::pipeline::RetrievalPipeline;

    fn shared() -> Arc<SharedPipeline> {
        let s = SharedPipeline::new(
            RetrievalPipeline::new(
                ChunkConfig::new(80, 20).unwrap(),
                Embedder::hash_seeded(32).unwrap(),
            )
            .unwrap(),
        );
        s.rebuild(&["Rust has no garbage collector.", "Tokio is an async runtime."])
            .unwrap();
        Arc::new(s)
    }

    #[tokio::test]
    async fn test_ask_records_history() {
        let mut session = QaSession::new(shared(), Box::new(ExtractiveGenerator), 2, true);
        let a = session.ask("  Tokio is an async runtime.  ").await.unwrap();
        assert_eq!(a.contexts.len(), 2);
        assert_eq!(a.contexts[0].text(), "Tokio is an async runtime.");
        assert!(a.prompt.contains("Question: Tokio is an async runtime.\n"));
        assert!(a.answer.contains("Tokio is an async runtime."));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().turns()[0].question, "Tokio is an async runtime.");

        session.clear_history();
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_history_disabled() {
        let mut session = QaSession::new(shared(), Box::new(ExtractiveGenerator), 1, false);
        session.ask("rust").await.unwrap();
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let mut session = QaSession::new(shared(), Box::new(ExtractiveGenerator), 1, true);
        assert!(session.ask("   ").await.is_err());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_ask_before_index_fails() {
        let empty = SharedPipeline::new(
            RetrievalPipeline::new(ChunkConfig::default(), Embedder::hash_seeded(8).unwrap())
                .unwrap(),
        );
        let mut session = QaSession::new(Arc::new(empty), Box::new(ExtractiveGenerator), 1, true);
        let err = session.ask("anything").await.unwrap_err();
        assert!(err.to_string().contains("empty input"));
    }
}
