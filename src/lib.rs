//! Intro Analyzer
//!
//! Acquires short intro clips from video URLs, analyzes them with a
//! multimodal model, stores the results and ranks them for free-text search.

pub mod analysis;
pub mod config;
pub mod direction;
pub mod error;
pub mod janitor;
pub mod llm;
pub mod models;
pub mod process;
pub mod processing;
pub mod search;
pub mod store;
pub mod video;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for easy access
pub use crate::analysis::ContentAnalyzer;
pub use crate::config::{Config, ConfigBuilder};
pub use crate::direction::{DirectionGenerator, DirectionPreferences, VisualDirection};
pub use crate::error::{ErrorKind, PipelineError};
pub use crate::janitor::{SweepReport, TempFileJanitor};
pub use crate::llm::{LLMConfig, LLMProvider, LLM};
pub use crate::models::{AnalysisResult, ClipRequest, IngestRequest, IntroRecord, SubmitterMetadata};
pub use crate::processing::IngestionPipeline;
pub use crate::search::{RelevanceSearchEngine, ScoredRecord, SearchFilters};
pub use crate::store::{IntroStore, JsonFileStore};
pub use crate::video::{AcquiredClip, ClipAcquirer};
