//! Supabase PostgREST row store
//!
//! Every request carries the project key as `apikey` and the caller's own
//! token as the bearer, so row-level security scopes reads and writes to the
//! caller. Embeddings are written through entry updates and searched with the
//! `match_entries` RPC.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::ai::contract::excerpt;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::models::{EntryPatch, EntryRow, NewEntry, NewReport, ReportRow};

use super::{RowStore, SortOrder, VectorSearch};

/// Entry columns returned to callers (never the embedding)
const ENTRY_COLUMNS: &str =
    "id,user_id,content,created_at,updated_at,mood_score,themes,distortions,observation,analyzed";

#[derive(Clone)]
pub struct PostgrestStore {
    http_client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_count: usize,
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    #[serde(flatten)]
    entry: EntryRow,
    #[serde(default)]
    similarity: Option<f64>,
}

impl PostgrestStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, identity: &Identity) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/rest/v1/{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", identity.token))
            .header("Prefer", "return=representation")
    }

    async fn send<T: DeserializeOwned>(&self, req_builder: RequestBuilder) -> Result<T> {
        let response = req_builder
            .send()
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Store(format!("unexpected response body: {}", e)))
    }

    async fn first_entry(&self, req_builder: RequestBuilder) -> Result<Option<EntryRow>> {
        let rows: Vec<EntryRow> = self.send(req_builder).await?;
        Ok(rows.into_iter().next())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Store(format!("PostgREST {}: {}", status, excerpt(&body))))
}

fn id_filter(id: Uuid) -> String {
    format!("eq.{}", id)
}

#[async_trait]
impl RowStore for PostgrestStore {
    async fn insert_entry(&self, entry: &NewEntry, identity: &Identity) -> Result<EntryRow> {
        let req = self
            .request(Method::POST, "entries", identity)
            .query(&[("select", ENTRY_COLUMNS)])
            .json(entry);
        self.first_entry(req)
            .await?
            .ok_or_else(|| Error::Store("insert returned no row".into()))
    }

    async fn list_entries(&self, identity: &Identity) -> Result<Vec<EntryRow>> {
        let req = self
            .request(Method::GET, "entries", identity)
            .query(&[("select", ENTRY_COLUMNS), ("order", "created_at.desc")]);
        self.send(req).await
    }

    async fn get_entry(&self, id: Uuid, identity: &Identity) -> Result<Option<EntryRow>> {
        let req = self.request(Method::GET, "entries", identity).query(&[
            ("select", ENTRY_COLUMNS.to_string()),
            ("id", id_filter(id)),
            ("limit", "1".to_string()),
        ]);
        self.first_entry(req).await
    }

    async fn update_entry(
        &self,
        id: Uuid,
        patch: &EntryPatch,
        identity: &Identity,
    ) -> Result<Option<EntryRow>> {
        debug!(entry_id = %id, "PATCH entries");
        let req = self
            .request(Method::PATCH, "entries", identity)
            .query(&[("select", ENTRY_COLUMNS.to_string()), ("id", id_filter(id))])
            .json(patch);
        self.first_entry(req).await
    }

    async fn delete_entry(&self, id: Uuid, identity: &Identity) -> Result<bool> {
        let req = self
            .request(Method::DELETE, "entries", identity)
            .query(&[("select", "id".to_string()), ("id", id_filter(id))]);
        let deleted: Vec<serde_json::Value> = self.send(req).await?;
        Ok(!deleted.is_empty())
    }

    async fn analyzed_entries(
        &self,
        identity: &Identity,
        order: SortOrder,
        limit: Option<usize>,
    ) -> Result<Vec<EntryRow>> {
        let order = match order {
            SortOrder::NewestFirst => "created_at.desc",
            SortOrder::OldestFirst => "created_at.asc",
        };
        let mut params = vec![
            ("select", ENTRY_COLUMNS.to_string()),
            ("analyzed", "eq.true".to_string()),
            ("mood_score", "not.is.null".to_string()),
            ("order", order.to_string()),
        ];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        let req = self.request(Method::GET, "entries", identity).query(&params);
        self.send(req).await
    }

    async fn insert_report(&self, report: &NewReport, identity: &Identity) -> Result<ReportRow> {
        let req = self.request(Method::POST, "reports", identity).json(report);
        let rows: Vec<ReportRow> = self.send(req).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::Store("insert returned no report".into()))
    }

    async fn list_reports(&self, identity: &Identity) -> Result<Vec<ReportRow>> {
        let req = self
            .request(Method::GET, "reports", identity)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.send(req).await
    }

    async fn get_report(&self, id: Uuid, identity: &Identity) -> Result<Option<ReportRow>> {
        let req = self.request(Method::GET, "reports", identity).query(&[
            ("select", "*".to_string()),
            ("id", id_filter(id)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<ReportRow> = self.send(req).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl VectorSearch for PostgrestStore {
    async fn nearest(
        &self,
        embedding: &[f32],
        k: usize,
        identity: &Identity,
    ) -> Result<Vec<(EntryRow, f64)>> {
        let req = self
            .request(Method::POST, "rpc/match_entries", identity)
            .json(&MatchRequest {
                query_embedding: embedding,
                match_count: k,
            });
        let rows: Vec<MatchRow> = self.send(req).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.entry, row.similarity.unwrap_or(0.0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let store = PostgrestStore::new("https://project.supabase.co/", "anon");
        assert_eq!(store.base_url(), "https://project.supabase.co");
    }

    #[test]
    fn test_match_row_flattens_entry() {
        let json = r#"{
            "id": "6f1c0f38-2f6d-4e4a-9a57-0d3b9e1b8a11",
            "content": "Walked by the river after work.",
            "created_at": "2026-10-01T18:00:00Z",
            "mood_score": 7.0,
            "themes": ["rest"],
            "similarity": 0.42
        }"#;
        let row: MatchRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.similarity, Some(0.42));
        assert_eq!(row.entry.content, "Walked by the river after work.");
        assert_eq!(row.entry.themes, vec!["rest"]);
    }

    #[test]
    fn test_match_request_serialization() {
        let request = MatchRequest {
            query_embedding: &[0.5, -0.5],
            match_count: 8,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["match_count"], 8);
        assert_eq!(json["query_embedding"][1], -0.5);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_store_error() {
        let store = PostgrestStore::new("http://127.0.0.1:9", "anon");
        let identity = Identity {
            user_id: Uuid::new_v4(),
            token: "t".into(),
        };
        let result = store.list_entries(&identity).await;
        assert!(matches!(result, Err(Error::Store(_))));
    }
}
