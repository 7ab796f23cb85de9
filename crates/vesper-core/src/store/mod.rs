//! Row store and vector search seams
//!
//! Every operation is scoped by the caller's [`Identity`]. `PostgrestStore`
//! forwards the bearer token so row-level security applies server side;
//! `MemoryStore` filters on the token's user id.

mod memory;
mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{StoreConfig, StoreKind};
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::models::{EntryPatch, EntryRow, NewEntry, NewReport, ReportRow};

/// Ordering for analyzed-entry queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    NewestFirst,
    OldestFirst,
}

/// Persistence of entries and reports
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn insert_entry(&self, entry: &NewEntry, identity: &Identity) -> Result<EntryRow>;

    /// All of the caller's entries, newest first
    async fn list_entries(&self, identity: &Identity) -> Result<Vec<EntryRow>>;

    async fn get_entry(&self, id: Uuid, identity: &Identity) -> Result<Option<EntryRow>>;

    /// Apply a partial update in one write. `None` when no visible row matched.
    async fn update_entry(
        &self,
        id: Uuid,
        patch: &EntryPatch,
        identity: &Identity,
    ) -> Result<Option<EntryRow>>;

    /// `false` when no visible row matched
    async fn delete_entry(&self, id: Uuid, identity: &Identity) -> Result<bool>;

    /// Analyzed entries that carry a mood score
    async fn analyzed_entries(
        &self,
        identity: &Identity,
        order: SortOrder,
        limit: Option<usize>,
    ) -> Result<Vec<EntryRow>>;

    async fn insert_report(&self, report: &NewReport, identity: &Identity) -> Result<ReportRow>;

    /// All of the caller's reports, newest first
    async fn list_reports(&self, identity: &Identity) -> Result<Vec<ReportRow>>;

    async fn get_report(&self, id: Uuid, identity: &Identity) -> Result<Option<ReportRow>>;
}

/// Nearest-neighbor search over stored entry embeddings
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Up to `k` of the caller's entries with their raw cosine similarity,
    /// most similar first
    async fn nearest(
        &self,
        embedding: &[f32],
        k: usize,
        identity: &Identity,
    ) -> Result<Vec<(EntryRow, f64)>>;
}

/// Handles to the two seams, usually backed by one store
#[derive(Clone)]
pub struct Stores {
    pub rows: Arc<dyn RowStore>,
    pub vectors: Arc<dyn VectorSearch>,
}

impl Stores {
    /// Share one store behind both seams
    pub fn shared<S: RowStore + VectorSearch + 'static>(store: S) -> Self {
        let store = Arc::new(store);
        Self {
            rows: store.clone(),
            vectors: store,
        }
    }
}

/// Build the configured store
pub fn from_config(config: &StoreConfig) -> Result<Stores> {
    match config.kind {
        StoreKind::Memory => Ok(Stores::shared(MemoryStore::new())),
        StoreKind::Postgrest => {
            let (Some(url), Some(key)) = (&config.url, &config.key) else {
                return Err(Error::Configuration(
                    "SUPABASE_URL and SUPABASE_KEY are required for the postgrest store".into(),
                ));
            };
            Ok(Stores::shared(PostgrestStore::new(url, key)))
        }
    }
}
