//! # RAG Harness Core
//!
//! Pure retrieval logic for RAG Harness: deterministic embedders,
//! sliding-window chunking, an exact vector index, and the pipeline that
//! ties them together into ranked contexts and a grounding prompt.
//!
//! This crate performs no filesystem or network I/O and starts no async
//! runtime. Loading documents, persisting indexes, and calling a language
//! model are the application crate's job.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`embedding`] | Hash-seeded and vocabulary-lookup embedders, vector helpers |
//! | [`chunk`] | Overlapping fixed-size character windows |
//! | [`index`] | Brute-force top-K search under cosine or L2 |
//! | [`pipeline`] | Chunk → embed → index, query → contexts → prompt |
//! | [`generate`] | Trait for the answer-generation collaborator |
//! | [`models`] | Chunks, index entries, search results |
//! | [`error`] | [`RagError`] |

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod index;
pub mod models;
pub mod pipeline;

pub use error::{RagError, Result};
