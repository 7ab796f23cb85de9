//! Entry insight pipeline
//!
//! Per-entry state machine: `Pending → Analyzing → Analyzed | Failed`.
//!
//! Short entries fail immediately with a placeholder and no provider calls.
//! Otherwise the completion and the embedding are requested concurrently;
//! if both succeed and the output passes the contract, the insight and
//! embedding are written in one update. Any failure writes the fallback
//! observation instead, so a row never ends up with a null observation.
//!
//! Persistence failures are logged and dropped. A content edit simply spawns
//! a new run; runs are not fenced, so the last write wins.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ai::contract::parse_insight;
use crate::ai::ModelGateway;
use crate::error::Result;
use crate::identity::Identity;
use crate::models::{AnalysisOutcome, EmbeddingVector, EMBEDDING_DIMS};
use crate::prompts::{PromptId, PromptLibrary};
use crate::store::RowStore;

/// Entries shorter than this are not sent to the model
pub const MIN_WORDS: usize = 20;

pub const SHORT_ENTRY_OBSERVATION: &str = "Write at least 20 words for AI insights.";

pub const FALLBACK_OBSERVATION: &str = "Analysis unavailable — please try again later.";

/// Lifecycle of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    Pending,
    Analyzing,
    Analyzed,
    Failed,
}

impl AnalysisState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisState::Analyzed | AnalysisState::Failed)
    }
}

/// Whitespace-delimited word count used for the length gate
pub fn word_count(content: &str) -> usize {
    content.split_whitespace().count()
}

#[derive(Clone)]
pub struct InsightPipeline {
    gateway: ModelGateway,
    store: Arc<dyn RowStore>,
    prompts: Arc<PromptLibrary>,
}

impl InsightPipeline {
    pub fn new(gateway: ModelGateway, store: Arc<dyn RowStore>, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            gateway,
            store,
            prompts,
        }
    }

    /// Fire-and-forget analysis of an entry
    ///
    /// The task is detached from the caller: dropping the handle does not
    /// cancel it. Awaiting the handle yields the terminal state.
    pub fn spawn(&self, entry_id: Uuid, content: String, identity: Identity) -> JoinHandle<AnalysisState> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run(entry_id, &content, &identity).await })
    }

    /// Run the full pipeline for one entry and persist the outcome
    pub async fn run(&self, entry_id: Uuid, content: &str, identity: &Identity) -> AnalysisState {
        debug!(entry_id = %entry_id, state = ?AnalysisState::Pending, "Analysis queued");

        let outcome = match self.evaluate(content).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_recoverable() => {
                warn!(entry_id = %entry_id, error = %e, "Analysis failed, storing fallback");
                AnalysisOutcome::Fallback {
                    observation: FALLBACK_OBSERVATION,
                }
            }
            Err(e) => {
                error!(entry_id = %entry_id, error = %e, "Analysis could not run, storing fallback");
                AnalysisOutcome::Fallback {
                    observation: FALLBACK_OBSERVATION,
                }
            }
        };

        let state = if outcome.is_success() {
            AnalysisState::Analyzed
        } else {
            AnalysisState::Failed
        };

        if let AnalysisOutcome::Success { ref insight, .. } = outcome {
            info!(
                entry_id = %entry_id,
                mood = insight.mood_score,
                themes = ?insight.themes,
                distortions = insight.distortions.len(),
                "Entry analysed"
            );
        }

        self.persist(entry_id, outcome, identity).await;
        debug!(entry_id = %entry_id, state = ?state, "Analysis finished");
        state
    }

    /// Produce an outcome without persisting it
    ///
    /// Short entries yield the placeholder fallback. Provider and contract
    /// failures are returned as errors for the caller to handle.
    pub async fn evaluate(&self, content: &str) -> Result<AnalysisOutcome> {
        let words = word_count(content);
        if words < MIN_WORDS {
            info!(words, min = MIN_WORDS, "Entry too short, skipping analysis");
            return Ok(AnalysisOutcome::Fallback {
                observation: SHORT_ENTRY_OBSERVATION,
            });
        }

        debug!(words, state = ?AnalysisState::Analyzing, "Dispatching completion and embedding");

        let prompt = self.prompts.get(PromptId::AnalyzeEntry);
        let mut vars = HashMap::new();
        vars.insert("entry", content);
        let user_prompt = prompt.render_user(&vars);

        let (raw, vector) = tokio::try_join!(
            self.gateway.complete(
                &prompt.system,
                &user_prompt,
                PromptId::AnalyzeEntry.temperature()
            ),
            self.gateway.embed(content, EMBEDDING_DIMS),
        )?;

        let insight = parse_insight(&raw)?;
        let embedding = EmbeddingVector::new(vector)?;
        Ok(AnalysisOutcome::Success { insight, embedding })
    }

    async fn persist(&self, entry_id: Uuid, outcome: AnalysisOutcome, identity: &Identity) {
        let patch = outcome.into_patch();
        match self.store.update_entry(entry_id, &patch, identity).await {
            Ok(Some(_)) => {}
            Ok(None) => warn!(entry_id = %entry_id, "Entry no longer exists, analysis discarded"),
            Err(e) => error!(entry_id = %entry_id, error = %e, "Failed to write analysis results"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIClient, MockBackend};
    use crate::error::Error;
    use crate::test_utils::unsigned_token;
    use crate::models::{EntryPatch, EntryRow, NewEntry, NewReport, ReportRow};
    use crate::store::{MemoryStore, SortOrder};
    use async_trait::async_trait;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ")
    }

    fn pipeline(mock: &MockBackend, store: Arc<dyn RowStore>) -> InsightPipeline {
        InsightPipeline::new(
            ModelGateway::with_client(AIClient::Mock(mock.clone())),
            store,
            Arc::new(PromptLibrary::embedded()),
        )
    }

    async fn seeded(store: &MemoryStore, content: &str) -> (Uuid, Identity) {
        let identity = Identity::from_token(&unsigned_token(Uuid::new_v4())).unwrap();
        let row = store
            .insert_entry(
                &NewEntry {
                    user_id: identity.user_id,
                    content: content.to_string(),
                },
                &identity,
            )
            .await
            .unwrap();
        (row.id, identity)
    }

    #[test]
    fn test_word_count_uses_whitespace() {
        assert_eq!(word_count("  one\ttwo\n\nthree  "), 3);
        assert_eq!(word_count(""), 0);
    }

    #[tokio::test]
    async fn test_nineteen_words_fails_without_provider_calls() {
        let mock = MockBackend::new();
        let store = MemoryStore::new();
        let content = words(19);
        let (id, identity) = seeded(&store, &content).await;

        let state = pipeline(&mock, Arc::new(store.clone()))
            .run(id, &content, &identity)
            .await;

        assert_eq!(state, AnalysisState::Failed);
        assert_eq!(mock.complete_calls(), 0);
        assert_eq!(mock.embed_calls(), 0);
        let row = store.get_entry(id, &identity).await.unwrap().unwrap();
        assert!(!row.analyzed);
        assert_eq!(row.observation.as_deref(), Some(SHORT_ENTRY_OBSERVATION));
    }

    #[tokio::test]
    async fn test_twenty_words_dispatches_both_calls() {
        let mock = MockBackend::new();
        let store = MemoryStore::new();
        let content = words(20);
        let (id, identity) = seeded(&store, &content).await;

        let state = pipeline(&mock, Arc::new(store.clone()))
            .run(id, &content, &identity)
            .await;

        assert_eq!(state, AnalysisState::Analyzed);
        assert_eq!(mock.complete_calls(), 1);
        assert_eq!(mock.embed_calls(), 1);
        assert!(mock.last_user_prompt().unwrap().contains("word19"));
    }

    #[tokio::test]
    async fn test_contract_violation_stores_fallback() {
        let mock = MockBackend::new().with_completion("I'm sorry, I can't help with that.");
        let store = MemoryStore::new();
        let content = words(25);
        let (id, identity) = seeded(&store, &content).await;

        let state = pipeline(&mock, Arc::new(store.clone()))
            .run(id, &content, &identity)
            .await;

        assert_eq!(state, AnalysisState::Failed);
        let row = store.get_entry(id, &identity).await.unwrap().unwrap();
        assert_eq!(row.observation.as_deref(), Some(FALLBACK_OBSERVATION));
        assert!(row.mood_score.is_none());
        assert!(store.embedding(id).await.is_none());
    }

    #[tokio::test]
    async fn test_wrong_embedding_length_stores_fallback() {
        let mock = MockBackend::new().with_embedding(vec![0.1; 1536]);
        let store = MemoryStore::new();
        let content = words(25);
        let (id, identity) = seeded(&store, &content).await;

        let state = pipeline(&mock, Arc::new(store.clone()))
            .run(id, &content, &identity)
            .await;
        assert_eq!(state, AnalysisState::Failed);
    }

    #[tokio::test]
    async fn test_evaluate_surfaces_errors() {
        let mock = MockBackend::new().failing_completion("rate limited");
        let store = MemoryStore::new();
        let result = pipeline(&mock, Arc::new(store)).evaluate(&words(30)).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    /// Delegates to a MemoryStore but refuses every update
    struct ReadOnlyStore(MemoryStore);

    #[async_trait]
    impl RowStore for ReadOnlyStore {
        async fn insert_entry(&self, entry: &NewEntry, identity: &Identity) -> Result<EntryRow> {
            self.0.insert_entry(entry, identity).await
        }
        async fn list_entries(&self, identity: &Identity) -> Result<Vec<EntryRow>> {
            self.0.list_entries(identity).await
        }
        async fn get_entry(&self, id: Uuid, identity: &Identity) -> Result<Option<EntryRow>> {
            self.0.get_entry(id, identity).await
        }
        async fn update_entry(
            &self,
            _id: Uuid,
            _patch: &EntryPatch,
            _identity: &Identity,
        ) -> Result<Option<EntryRow>> {
            Err(Error::Store("read-only".into()))
        }
        async fn delete_entry(&self, id: Uuid, identity: &Identity) -> Result<bool> {
            self.0.delete_entry(id, identity).await
        }
        async fn analyzed_entries(
            &self,
            identity: &Identity,
            order: SortOrder,
            limit: Option<usize>,
        ) -> Result<Vec<EntryRow>> {
            self.0.analyzed_entries(identity, order, limit).await
        }
        async fn insert_report(&self, report: &NewReport, identity: &Identity) -> Result<ReportRow> {
            self.0.insert_report(report, identity).await
        }
        async fn list_reports(&self, identity: &Identity) -> Result<Vec<ReportRow>> {
            self.0.list_reports(identity).await
        }
        async fn get_report(&self, id: Uuid, identity: &Identity) -> Result<Option<ReportRow>> {
            self.0.get_report(id, identity).await
        }
    }

    #[tokio::test]
    async fn test_write_failure_is_not_fatal() {
        let mock = MockBackend::new();
        let memory = MemoryStore::new();
        let content = words(25);
        let (id, identity) = seeded(&memory, &content).await;

        let handle = pipeline(&mock, Arc::new(ReadOnlyStore(memory.clone())))
            .spawn(id, content, identity.clone());

        // The task completes normally; the row is simply left untouched
        assert_eq!(handle.await.unwrap(), AnalysisState::Analyzed);
        let row = memory.get_entry(id, &identity).await.unwrap().unwrap();
        assert!(!row.analyzed);
        assert!(row.observation.is_none());
    }
}
