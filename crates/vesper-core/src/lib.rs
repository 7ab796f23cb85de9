//! Vesper Core Library
//!
//! Shared functionality for the Vesper journaling assistant:
//! - Model client gateway for OpenAI-compatible inference providers
//! - Output contract validation for model-generated entry insights
//! - Entry insight pipeline (length gate, concurrent completion + embedding)
//! - Semantic similarity ranking over entry embeddings
//! - Weekly report synthesis
//! - Row store adapters (Supabase PostgREST, in-memory)
//! - Dashboard and drift timeline aggregates
//! - Prompt library with on-disk overrides

pub mod ai;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod identity;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod search;
pub mod store;

/// Test utilities including a mock OpenAI-compatible server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, MockBackend, ModelGateway, OpenAICompatibleBackend};
pub use config::{BackendKind, ProviderConfig, StoreConfig, StoreKind};
pub use dashboard::{DashboardStats, LatestAnalysis, SparkPoint, TimelinePoint};
pub use error::{Error, Result};
pub use identity::Identity;
pub use models::{
    AnalysisOutcome, Distortion, DistortionRecord, EmbeddingVector, EntryPatch, EntryRow,
    JournalEntryInsight, NewEntry, NewReport, ReportRow, SimilarityMatch, WeeklyReport,
    EMBEDDING_DIMS,
};
pub use pipeline::{AnalysisState, InsightPipeline};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use report::ReportSynthesizer;
pub use search::SimilarityRanker;
pub use store::{MemoryStore, PostgrestStore, RowStore, SortOrder, Stores, VectorSearch};
