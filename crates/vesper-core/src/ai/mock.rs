//! Mock backend for testing
//!
//! Returns a valid insight or report by default and can be scripted per test:
//! fixed completion text, injected failures, call counters, and an optional
//! rendezvous that only releases once `complete` and `embed` are in flight
//! together.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Barrier;

use crate::error::{Error, Result};

use super::AIBackend;

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<MockState>,
}

struct MockState {
    healthy: bool,
    completion: Mutex<Option<std::result::Result<String, String>>>,
    embedding: Mutex<Option<std::result::Result<Vec<f32>, String>>>,
    last_user_prompt: Mutex<Option<String>>,
    complete_calls: AtomicUsize,
    embed_calls: AtomicUsize,
    rendezvous: Option<Barrier>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy, default responses)
    pub fn new() -> Self {
        Self::build(true, None)
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self::build(false, None)
    }

    /// `complete` and `embed` each wait until the other has also been called.
    ///
    /// Sequential dispatch deadlocks against this backend, so tests wrap the
    /// call in a timeout to prove the two requests overlap.
    pub fn with_rendezvous() -> Self {
        Self::build(true, Some(Barrier::new(2)))
    }

    fn build(healthy: bool, rendezvous: Option<Barrier>) -> Self {
        Self {
            state: Arc::new(MockState {
                healthy,
                completion: Mutex::new(None),
                embedding: Mutex::new(None),
                last_user_prompt: Mutex::new(None),
                complete_calls: AtomicUsize::new(0),
                embed_calls: AtomicUsize::new(0),
                rendezvous,
            }),
        }
    }

    /// Return `text` from every completion
    pub fn with_completion(self, text: &str) -> Self {
        set(&self.state.completion, Ok(text.to_string()));
        self
    }

    /// Fail every completion with a transport error
    pub fn failing_completion(self, message: &str) -> Self {
        set(&self.state.completion, Err(message.to_string()));
        self
    }

    /// Return `vector` from every embedding call
    pub fn with_embedding(self, vector: Vec<f32>) -> Self {
        set(&self.state.embedding, Ok(vector));
        self
    }

    /// Fail every embedding call with a transport error
    pub fn failing_embedding(self, message: &str) -> Self {
        set(&self.state.embedding, Err(message.to_string()));
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.state.complete_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.state.embed_calls.load(Ordering::SeqCst)
    }

    /// User prompt of the most recent completion
    pub fn last_user_prompt(&self) -> Option<String> {
        self.state
            .last_user_prompt
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    async fn meet(&self) {
        if let Some(ref barrier) = self.state.rendezvous {
            barrier.wait().await;
        }
    }
}

fn set<T>(slot: &Mutex<Option<T>>, value: T) {
    if let Ok(mut guard) = slot.lock() {
        *guard = Some(value);
    }
}

fn scripted<T: Clone>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().ok().and_then(|guard| guard.clone())
}

/// Deterministic bag-of-words embedding, L2-normalized
///
/// Texts sharing words land close together, which keeps similarity search
/// meaningful in tests without a real model.
pub(crate) fn hashed_embedding(text: &str, dims: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dims];
    if dims == 0 {
        return vector;
    }
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        let bucket = (hasher.finish() % dims as u64) as usize;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
    vector
}

fn default_completion(system_prompt: &str) -> String {
    if system_prompt.contains("dominant_emotion") {
        json!({
            "dominant_emotion": "reflective",
            "top_themes": ["work pressure", "rest", "relationships"],
            "emotional_arc": "The week opened tense and gradually settled as rest returned.",
            "ai_observation": "Small routines seem to steady you when workload rises."
        })
        .to_string()
    } else {
        json!({
            "mood_score": 6.5,
            "themes": ["work pressure", "self-care"],
            "distortions": ["Catastrophizing"],
            "observation": "Naming the pressure so clearly suggests some part of this week already feels more manageable."
        })
        .to_string()
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _temperature: f32,
    ) -> Result<String> {
        self.state.complete_calls.fetch_add(1, Ordering::SeqCst);
        set(&self.state.last_user_prompt, user_prompt.to_string());
        self.meet().await;

        match scripted(&self.state.completion) {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(Error::Transport(message)),
            None => Ok(default_completion(system_prompt)),
        }
    }

    async fn embed(&self, text: &str, dims: usize) -> Result<Vec<f32>> {
        self.state.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.meet().await;

        match scripted(&self.state.embedding) {
            Some(Ok(vector)) => Ok(vector),
            Some(Err(message)) => Err(Error::Transport(message)),
            None => Ok(hashed_embedding(text, dims)),
        }
    }

    async fn health_check(&self) -> bool {
        self.state.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
