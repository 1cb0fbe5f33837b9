//! Conversation history and its export formats.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use rag_harness_core::models::RetrievedContext;

/// One question and the answer given to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Where a context used for an answer came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Document label, usually its path relative to the sources root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub doc_id: usize,
    pub chunk_id: usize,
    pub score: f32,
}

impl From<&RetrievedContext> for SourceRef {
    fn from(ctx: &RetrievedContext) -> Self {
        Self {
            source: ctx.chunk.source.clone(),
            doc_id: ctx.chunk.doc_id,
            chunk_id: ctx.chunk.chunk_id,
            score: ctx.score,
        }
    }
}

impl Turn {
    pub fn new(question: &str, answer: &str, contexts: &[RetrievedContext]) -> Self {
        Self {
            timestamp: Utc::now(),
            question: question.to_string(),
            answer: answer.to_string(),
            sources: contexts.iter().map(SourceRef::from).collect(),
        }
    }
}

/// Suffixes tried before giving up on a free export file name.
const MAX_NAME_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
    Markdown,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            other => bail!("Unknown export format: '{}'. Use text, json, or markdown.", other),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Text => "text",
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "markdown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&self.turns)?),
            ExportFormat::Text => Ok(self.render_text()),
            ExportFormat::Markdown => Ok(self.render_markdown()),
        }
    }

    /// Write the history to `dir/chat_history_<UTC timestamp>.<ext>`,
    /// creating `dir` if needed. Returns the written path.
    ///
    /// Existing files are never overwritten; a name already taken gets a
    /// numeric suffix.
    pub fn export(&self, dir: &Path, format: ExportFormat) -> Result<PathBuf> {
        if self.is_empty() {
            bail!("Conversation history is empty; nothing to export");
        }

        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

        let rendered = self.render(format)?;
        let stem = format!("chat_history_{}", Utc::now().format("%Y%m%d_%H%M%S_%3f"));

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let filename = match attempt {
                0 => format!("{}.{}", stem, format.extension()),
                n => format!("{}_{}.{}", stem, n, format.extension()),
            };
            let path = dir.join(filename);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {}", path.display()))
                }
            };
            file.write_all(rendered.as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;

            info!(
                path = %path.display(),
                turns = self.len(),
                %format,
                "exported conversation history"
            );
            return Ok(path);
        }

        bail!(
            "Could not find a free export file name for {} in {}",
            stem,
            dir.display()
        )
    }

    fn render_text(&self) -> String {
        let mut out = format!("Conversation history ({} turns)\n", self.len());
        for (i, turn) in self.turns.iter().enumerate() {
            out.push_str(&format!(
                "\n[{}] {}\nQ: {}\nA: {}\n",
                i + 1,
                timestamp(turn),
                turn.question,
                turn.answer
            ));
            if !turn.sources.is_empty() {
                out.push_str(&format!("Sources: {}\n", sources_line(&turn.sources)));
            }
        }
        out
    }

    fn render_markdown(&self) -> String {
        let mut out = String::from("# Conversation history\n");
        for (i, turn) in self.turns.iter().enumerate() {
            out.push_str(&format!(
                "\n## Turn {}\n\n*{}*\n\n**Question:** {}\n\n**Answer:**\n\n{}\n",
                i + 1,
                timestamp(turn),
                turn.question,
                turn.answer
            ));
            if !turn.sources.is_empty() {
                out.push_str(&format!("\n**Sources:** {}\n", sources_line(&turn.sources)));
            }
        }
        out
    }
}

fn timestamp(turn: &Turn) -> String {
    turn.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn sources_line(sources: &[SourceRef]) -> String {
    sources
        .iter()
        .map(|s| match &s.source {
            Some(source) => format!("{} chunk {} ({:.4})", source, s.chunk_id, s.score),
            None => format!("doc {} chunk {} ({:.4})", s.doc_id, s.chunk_id, s.score),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
