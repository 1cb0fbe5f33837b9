//! # RAG Harness
//!
//! A local-first retrieval-augmented generation harness.
//!
//! RAG Harness loads documents from a directory tree, splits them into
//! overlapping windows, embeds each window deterministically, and answers
//! questions by retrieving the closest windows, wrapping them in a grounding
//! prompt, and handing that prompt to a generator: an offline extractive
//! stand-in or any OpenAI-compatible chat-completions endpoint.
//!
//! The retrieval logic itself lives in [`rag_harness_core`]; this crate adds
//! the I/O around it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────┐   ┌────────────┐
//! │  Loader  │──▶│ RetrievalPipeline│──▶│  Snapshot  │
//! │ md/txt/  │   │ chunk+embed+index│   │   (JSON)   │
//! │   pdf    │   └────────┬─────────┘   └────────────┘
//! └──────────┘            │ SharedPipeline (swap on rebuild)
//!                         ▼
//!                   ┌───────────┐   ┌───────────┐
//!                   │ QaSession │──▶│ Generator │
//!                   │ + history │   │ local/API │
//!                   └───────────┘   └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`loader`] | Directory walking, text and PDF loading |
//! | [`ingest`] | Build or restore the index from configuration |
//! | [`snapshot`] | Save and load indexes on disk |
//! | [`shared`] | Concurrent readers, rebuild by swap |
//! | [`generation`] | Extractive and chat-completions generators |
//! | [`session`] | Question answering with history |
//! | [`history`] | Conversation turns and export formats |
//! | [`telemetry`] | Tracing subscriber setup |

pub mod config;
pub mod generation;
pub mod history;
pub mod ingest;
pub mod loader;
pub mod session;
pub mod shared;
pub mod snapshot;
pub mod telemetry;

pub use rag_harness_core;
