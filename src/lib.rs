//! Glimt - Multimodal Video Question Answering
//!
//! An agentic query-answering core for video content: given a question and a
//! video id, a planner agent selects tools (transcript retrieval, frame-level
//! vision queries, vector search) and an optional critic agent validates the
//! draft answer against visual evidence before the answer is finalized.
//!
//! The name "Glimt" comes from the Norwegian word for "glimpse."
//!
//! # Overview
//!
//! Glimt lets you:
//! - Answer natural-language questions about an ingested video
//! - Ground answers in transcripts, summaries, and sampled keyframes
//! - Validate draft answers with a critic pass over frame evidence
//! - Locate relevant videos across a search index
//!
//! Ingestion (keyframe extraction, embedding generation, blob upload) is an
//! external collaborator; Glimt consumes its materialized artifacts through
//! the [`artifacts::ArtifactStore`] and [`search::SearchProvider`] interfaces.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `artifacts` - Per-video materialized files (transcript, frames, summary)
//! - `frames` - Keyframe selection, allocation, and stacking
//! - `providers` - LLM and embedding backends (dependency-injected)
//! - `search` - Vector/full-text index collaborator and filter language
//! - `retry` - Bounded retry/backoff for rate-limited model APIs
//! - `timestamp` - Strict `HH:MM:SS` parsing and formatting
//! - `tools` - Tool adapters the planner and critic can invoke
//! - `agent` - Planner/critic agents and the orchestration loop
//! - `video_qna` - Per-request entry point for question answering
//! - `video_agent` - Top-level agent that first locates the right video
//!
//! # Example
//!
//! ```rust,no_run
//! use glimt::config::Settings;
//! use glimt::providers::Providers;
//! use glimt::video_qna::{QnaRequest, VideoQna};
//!
//! #[tokio::main]
//! async fn main() -> glimt::Result<()> {
//!     let settings = Settings::default();
//!     let providers = Providers::from_settings(&settings)?;
//!
//!     let request = QnaRequest::new("What is the tutor wearing?", "bcFvbtZafKM");
//!     let qna = VideoQna::new(request, providers, &settings)?;
//!     let response = qna.run().await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod frames;
pub mod providers;
pub mod retry;
pub mod search;
pub mod timestamp;
pub mod tools;
pub mod video_agent;
pub mod video_qna;

pub use error::{GlimtError, Result};
