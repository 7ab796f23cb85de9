//! Semantic similarity search over a caller's entries

use std::sync::Arc;

use tracing::debug;

use crate::ai::ModelGateway;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::models::{SimilarityMatch, EMBEDDING_DIMS};
use crate::store::VectorSearch;

pub const DEFAULT_LIMIT: usize = 8;
pub const MAX_LIMIT: usize = 20;
pub const MAX_QUERY_CHARS: usize = 1000;

/// Raw cosine similarity of embedded journal text rarely exceeds ~0.6, so
/// scores are stretched: 0.4 reads as 70%, anything from ~0.57 up as 100%.
pub const SIMILARITY_SCALE: f64 = 1.75;

/// Map a raw cosine similarity onto [0, 1], rounded to 4 decimals
pub fn rescale(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    let scaled = (raw * SIMILARITY_SCALE).clamp(0.0, 1.0);
    (scaled * 10_000.0).round() / 10_000.0
}

#[derive(Clone)]
pub struct SimilarityRanker {
    gateway: ModelGateway,
    index: Arc<dyn VectorSearch>,
}

impl SimilarityRanker {
    pub fn new(gateway: ModelGateway, index: Arc<dyn VectorSearch>) -> Self {
        Self { gateway, index }
    }

    /// Embed `query` and return the nearest entries with rescaled scores
    ///
    /// Results keep the order the index returned them in.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        identity: &Identity,
    ) -> Result<Vec<SimilarityMatch>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(Error::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query must not be empty".into()));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(Error::InvalidInput(format!(
                "query must be at most {} characters",
                MAX_QUERY_CHARS
            )));
        }

        let embedding = self.gateway.embed(query, EMBEDDING_DIMS).await?;
        let hits = self.index.nearest(&embedding, limit, identity).await?;
        debug!(hits = hits.len(), limit, "Similarity search");

        Ok(hits
            .into_iter()
            .map(|(entry, raw)| SimilarityMatch {
                entry,
                similarity: rescale(raw),
            })
            .collect())
    }
}
