//! Integration tests for vesper-core
//!
//! These tests exercise the full entry → analysis → search → report workflow
//! against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use vesper_core::{
    pipeline::{FALLBACK_OBSERVATION, SHORT_ENTRY_OBSERVATION},
    AIClient, AnalysisState, EntryPatch, Identity, InsightPipeline, MemoryStore, MockBackend,
    ModelGateway, NewEntry, PromptLibrary, ReportSynthesizer, RowStore, SimilarityRanker,
    SortOrder, EMBEDDING_DIMS,
};
use vesper_core::test_utils::unsigned_token;

const TWENTY_FIVE_WORDS: &str = "Spent the morning walking along the river before work and felt \
    calmer than I have in weeks even though the deadline is looming over everything";

struct Harness {
    store: MemoryStore,
    pipeline: InsightPipeline,
    ranker: SimilarityRanker,
    synthesizer: ReportSynthesizer,
    identity: Identity,
}

fn harness(mock: MockBackend) -> Harness {
    let gateway = ModelGateway::with_client(AIClient::Mock(mock));
    let store = MemoryStore::new();
    let prompts = Arc::new(PromptLibrary::embedded());
    Harness {
        pipeline: InsightPipeline::new(gateway.clone(), Arc::new(store.clone()), prompts.clone()),
        ranker: SimilarityRanker::new(gateway.clone(), Arc::new(store.clone())),
        synthesizer: ReportSynthesizer::new(gateway, prompts),
        store,
        identity: Identity::from_token(&unsigned_token(Uuid::new_v4())).unwrap(),
    }
}

impl Harness {
    async fn create(&self, content: &str) -> Uuid {
        self.store
            .insert_entry(
                &NewEntry {
                    user_id: self.identity.user_id,
                    content: content.to_string(),
                },
                &self.identity,
            )
            .await
            .expect("insert entry")
            .id
    }

    async fn analyze(&self, id: Uuid, content: &str) -> AnalysisState {
        self.pipeline
            .spawn(id, content.to_string(), self.identity.clone())
            .await
            .expect("analysis task panicked")
    }
}

// =============================================================================
// Pipeline
// =============================================================================

#[tokio::test]
async fn test_end_to_end_success() {
    assert_eq!(TWENTY_FIVE_WORDS.split_whitespace().count(), 25);
    let mock = MockBackend::new();
    let h = harness(mock.clone());
    let id = h.create(TWENTY_FIVE_WORDS).await;

    assert_eq!(h.analyze(id, TWENTY_FIVE_WORDS).await, AnalysisState::Analyzed);

    let row = h.store.get_entry(id, &h.identity).await.unwrap().unwrap();
    assert!(row.analyzed);
    let mood = row.mood_score.expect("mood stored");
    assert!((1.0..=10.0).contains(&mood));
    assert!(!row.themes.is_empty());
    assert_eq!(row.distortions[0].label, "Catastrophizing");
    assert!(row.observation.is_some());
    assert_eq!(h.store.embedding(id).await.map(|e| e.len()), Some(EMBEDDING_DIMS));
    assert_eq!(mock.complete_calls(), 1);
    assert_eq!(mock.embed_calls(), 1);
}

#[tokio::test]
async fn test_end_to_end_embedding_failure() {
    let h = harness(MockBackend::new().failing_embedding("503 Service Unavailable"));
    let id = h.create(TWENTY_FIVE_WORDS).await;

    assert_eq!(h.analyze(id, TWENTY_FIVE_WORDS).await, AnalysisState::Failed);

    let row = h.store.get_entry(id, &h.identity).await.unwrap().unwrap();
    assert!(!row.analyzed);
    assert_eq!(row.observation.as_deref(), Some(FALLBACK_OBSERVATION));
    assert!(h.store.embedding(id).await.is_none());
}

#[tokio::test]
async fn test_completion_and_embedding_run_concurrently() {
    // Each call blocks until the other one has started
    let mock = MockBackend::with_rendezvous();
    let h = harness(mock.clone());
    let id = h.create(TWENTY_FIVE_WORDS).await;

    let state = tokio::time::timeout(Duration::from_secs(5), h.analyze(id, TWENTY_FIVE_WORDS))
        .await
        .expect("completion and embedding were not dispatched concurrently");

    assert_eq!(state, AnalysisState::Analyzed);
    assert_eq!(mock.complete_calls(), 1);
    assert_eq!(mock.embed_calls(), 1);
}

#[tokio::test]
async fn test_short_entry_placeholder() {
    let mock = MockBackend::new();
    let h = harness(mock.clone());
    let id = h.create("Too tired to write much today.").await;

    assert_eq!(
        h.analyze(id, "Too tired to write much today.").await,
        AnalysisState::Failed
    );
    let row = h.store.get_entry(id, &h.identity).await.unwrap().unwrap();
    assert_eq!(row.observation.as_deref(), Some(SHORT_ENTRY_OBSERVATION));
    assert_eq!(mock.complete_calls() + mock.embed_calls(), 0);
}

#[tokio::test]
async fn test_content_edit_resets_and_reanalyzes() {
    let h = harness(MockBackend::new());
    let id = h.create(TWENTY_FIVE_WORDS).await;
    h.analyze(id, TWENTY_FIVE_WORDS).await;

    let edited = "Short now.";
    let row = h
        .store
        .update_entry(id, &EntryPatch::content_edit(edited), &h.identity)
        .await
        .unwrap()
        .unwrap();
    assert!(!row.analyzed);

    assert_eq!(h.analyze(id, edited).await, AnalysisState::Failed);
    let row = h.store.get_entry(id, &h.identity).await.unwrap().unwrap();
    assert_eq!(row.content, edited);
    assert_eq!(row.observation.as_deref(), Some(SHORT_ENTRY_OBSERVATION));
}

#[tokio::test]
async fn test_deleted_entry_analysis_is_discarded() {
    let h = harness(MockBackend::new());
    let id = h.create(TWENTY_FIVE_WORDS).await;
    assert!(h.store.delete_entry(id, &h.identity).await.unwrap());

    // The run still completes; there is just nothing to update
    assert_eq!(h.analyze(id, TWENTY_FIVE_WORDS).await, AnalysisState::Analyzed);
    assert_eq!(h.store.entry_count().await, 0);
}

// =============================================================================
// Search and Reports
// =============================================================================

#[tokio::test]
async fn test_search_finds_related_entry() {
    let h = harness(MockBackend::new());
    let entries = [
        "The river walk this morning was quiet and the water looked silver in the early light so I stayed by the river bank for an hour",
        "Budget meeting ran long again and the spreadsheet numbers still do not add up which means another late night of reconciling every single column",
        "Called my sister tonight and we laughed about old family holidays which reminded me how much I miss having everyone around the same table",
    ];
    let mut ids = Vec::new();
    for content in entries {
        let id = h.create(content).await;
        assert_eq!(h.analyze(id, content).await, AnalysisState::Analyzed);
        ids.push(id);
    }

    let matches = h
        .ranker
        .search("walk by the river", Some(2), &h.identity)
        .await
        .unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].entry.id, ids[0]);
    assert!(matches.iter().all(|m| (0.0..=1.0).contains(&m.similarity)));
    assert!(matches[0].similarity >= matches[1].similarity);
}

#[tokio::test]
async fn test_search_is_scoped_to_caller() {
    let h = harness(MockBackend::new());
    let id = h.create(TWENTY_FIVE_WORDS).await;
    h.analyze(id, TWENTY_FIVE_WORDS).await;

    let stranger = Identity::from_token(&unsigned_token(Uuid::new_v4())).unwrap();
    let matches = h.ranker.search("river", None, &stranger).await.unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_report_from_recent_analyzed_entries() {
    let mock = MockBackend::new();
    let h = harness(mock.clone());
    for _ in 0..9 {
        let id = h.create(TWENTY_FIVE_WORDS).await;
        h.analyze(id, TWENTY_FIVE_WORDS).await;
    }

    let recent = h
        .store
        .analyzed_entries(&h.identity, SortOrder::NewestFirst, Some(7))
        .await
        .unwrap();
    assert_eq!(recent.len(), 7);

    let report = h.synthesizer.synthesize(&recent).await.unwrap();
    assert!(!report.dominant_emotion.is_empty());
    assert!(report.top_themes.len() <= 5);

    let prompt = mock.last_user_prompt().unwrap();
    assert!(prompt.contains("Entry 7 "));
    assert!(!prompt.contains("Entry 8 "));
}

// =============================================================================
// Mock Provider Server
// =============================================================================

mod provider_server {
    use super::*;
    use vesper_core::test_utils::{MockProviderBehavior, MockProviderServer};
    use vesper_core::{Distortion, Error, ProviderConfig};

    fn gateway(server: &MockProviderServer) -> ModelGateway {
        ModelGateway::new(ProviderConfig::openai_compatible(
            &format!("{}/v1", server.url()),
            "sk-test",
            "mock-chat",
        ))
    }

    fn pipeline(gateway: ModelGateway, store: &MemoryStore) -> InsightPipeline {
        InsightPipeline::new(
            gateway,
            Arc::new(store.clone()),
            Arc::new(PromptLibrary::embedded()),
        )
    }

    #[tokio::test]
    async fn test_fenced_reply_over_http() {
        let server = MockProviderServer::start().await;
        let evaluated = pipeline(gateway(&server), &MemoryStore::new())
            .evaluate(TWENTY_FIVE_WORDS)
            .await
            .unwrap();

        match evaluated {
            vesper_core::AnalysisOutcome::Success { insight, embedding } => {
                assert_eq!(insight.mood_score, 7.2);
                assert_eq!(insight.distortions, vec![Distortion::MindReading]);
                assert_eq!(embedding.len(), EMBEDDING_DIMS);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_embedding_failure_falls_back() {
        let server = MockProviderServer::start_with(MockProviderBehavior {
            fail_embeddings: true,
            ..Default::default()
        })
        .await;
        let store = MemoryStore::new();
        let h = harness(MockBackend::new());
        let id = store
            .insert_entry(
                &NewEntry {
                    user_id: h.identity.user_id,
                    content: TWENTY_FIVE_WORDS.into(),
                },
                &h.identity,
            )
            .await
            .unwrap()
            .id;

        let state = pipeline(gateway(&server), &store)
            .run(id, TWENTY_FIVE_WORDS, &h.identity)
            .await;

        assert_eq!(state, AnalysisState::Failed);
        let row = store.get_entry(id, &h.identity).await.unwrap().unwrap();
        assert_eq!(row.observation.as_deref(), Some(FALLBACK_OBSERVATION));
    }

    #[tokio::test]
    async fn test_report_over_http() {
        let server = MockProviderServer::start().await;
        let synthesizer = ReportSynthesizer::new(gateway(&server), Arc::new(PromptLibrary::embedded()));
        let entry = vesper_core::EntryRow {
            content: TWENTY_FIVE_WORDS.into(),
            mood_score: Some(6.0),
            ..Default::default()
        };
        let report = synthesizer.synthesize(&[entry]).await.unwrap();
        assert_eq!(report.dominant_emotion, "hopeful");
        assert_eq!(report.top_themes, vec!["work pressure", "rest"]);
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let server = MockProviderServer::start().await;
        let mut config = ProviderConfig::openai_compatible(&server.url(), "sk-test", "mock-chat");
        config.api_key = None;
        let gateway = ModelGateway::new(config);

        let result = gateway.complete("system", "user", 0.4).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
