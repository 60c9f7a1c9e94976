//! HTTP client for a remote vector backend
//!
//! Speaks a small JSON API: embed, upsert, search, delete, list. Response
//! bodies go through the normalizing adapters in the parent module, so both
//! envelope shapes are accepted from any endpoint.

use async_trait::async_trait;
use serde_json::json;

use super::{
    normalize_list_response, normalize_upsert_response, BackendItem, SearchHit, UpsertOutcome,
    VectorBackend,
};
use crate::error::{RecallError, Result};
use crate::types::MemoryId;

/// Remote vector backend over HTTP
pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RemoteBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RecallError::Backend(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RecallError::Backend(format!(
                "backend API error {}: {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RecallError::Backend(format!("invalid JSON from {}: {}", url, e)))
    }
}

#[async_trait]
impl VectorBackend for RemoteBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let data = self.post("/embed", json!({ "input": text })).await?;
        let embedding: Vec<f32> = data["embedding"]
            .as_array()
            .ok_or_else(|| RecallError::Backend("embed response missing 'embedding'".into()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();
        Ok(embedding)
    }

    async fn upsert(
        &self,
        text: &str,
        user_external_id: &str,
        metadata: serde_json::Value,
    ) -> Result<Vec<UpsertOutcome>> {
        let data = self
            .post(
                "/memories",
                json!({
                    "text": text,
                    "user_id": user_external_id,
                    "metadata": metadata,
                }),
            )
            .await?;
        normalize_upsert_response(data)
    }

    async fn search(
        &self,
        query: &str,
        user_external_id: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let data = self
            .post(
                "/search",
                json!({
                    "query": query,
                    "user_id": user_external_id,
                    "limit": limit,
                }),
            )
            .await?;

        let hits = data
            .get("results")
            .cloned()
            .unwrap_or_else(|| data.clone());
        serde_json::from_value(hits)
            .map_err(|e| RecallError::Backend(format!("unexpected search response shape: {}", e)))
    }

    async fn delete(&self, id: MemoryId) -> Result<()> {
        let url = format!("{}/memories/{}/delete", self.base_url, id);
        let mut request = self.client.post(&url);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RecallError::Backend(format!("delete {} failed: {}", id, e)))?;

        if !response.status().is_success() {
            return Err(RecallError::Backend(format!(
                "backend delete {} failed with status {}",
                id,
                response.status()
            )));
        }
        Ok(())
    }

    async fn list_all(&self, user_external_id: &str) -> Result<Vec<BackendItem>> {
        let data = self
            .post("/memories/list", json!({ "user_id": user_external_id }))
            .await?;
        normalize_list_response(data)
    }
}
