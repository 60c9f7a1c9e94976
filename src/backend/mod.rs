//! Vector backend capability
//!
//! The embedding/similarity-search/upsert capability is consumed as an opaque,
//! possibly slow, possibly failing external system. It is authoritative for
//! semantic ranking and for memory identity assignment on upsert, never for
//! lifecycle truth (the ledger is).
//!
//! The wire layer is normalized here: some backends return a keyed envelope
//! (`{"results": [...]}`), others a bare sequence. Reconciliation code only
//! ever sees the normalized types.

#[cfg(feature = "remote")]
mod remote;

#[cfg(feature = "remote")]
pub use remote::RemoteBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RecallError, Result};
use crate::types::MemoryId;

/// Per-item outcome reported by the backend for an upsert batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemoryEvent {
    Add,
    Update,
    Delete,
    Noop,
}

/// Normalized upsert outcome: backend-assigned identity plus content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub id: MemoryId,
    pub event: MemoryEvent,
    /// Extracted memory content (may differ from the raw input text)
    #[serde(rename = "memory")]
    pub content: String,
}

/// A ranked similarity hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: Option<MemoryId>,
    pub score: f64,
    #[serde(rename = "memory")]
    pub content: Option<String>,
    pub hash: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// A stored item as reported by the backend's list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendItem {
    pub id: MemoryId,
    #[serde(rename = "memory")]
    pub content: String,
    pub hash: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// The external vector backend contract
///
/// Calls may block for a long time; callers are expected to bound them with a
/// deadline. Implementations must be safe to call concurrently.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Generate an embedding vector for a text
    ///
    /// The serving operations never call this directly: `upsert` and `search`
    /// embed on the backend side. It is part of the contract for backends
    /// that expose client-side embedding, and for operational tooling that
    /// needs raw vectors.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Extract and upsert memories from a text, returning per-item outcomes
    async fn upsert(
        &self,
        text: &str,
        user_external_id: &str,
        metadata: serde_json::Value,
    ) -> Result<Vec<UpsertOutcome>>;

    /// Top-K similarity search over a user's memories, ranked by the backend
    async fn search(
        &self,
        query: &str,
        user_external_id: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Delete one item from the index
    async fn delete(&self, id: MemoryId) -> Result<()>;

    /// List all items stored for a user
    async fn list_all(&self, user_external_id: &str) -> Result<Vec<BackendItem>>;
}

/// Raw wire item before id parsing
#[derive(Debug, Deserialize)]
struct WireItem {
    id: String,
    #[serde(rename = "memory", alias = "content", default)]
    content: String,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

/// The two response shapes backends are known to produce
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireEnvelope {
    Keyed { results: Vec<WireItem> },
    Bare(Vec<WireItem>),
}

impl WireEnvelope {
    fn into_items(self) -> Vec<WireItem> {
        match self {
            WireEnvelope::Keyed { results } => results,
            WireEnvelope::Bare(items) => items,
        }
    }
}

/// Parse a backend-reported id, surfacing garbage as a backend error
pub fn parse_backend_id(id: &str) -> Result<MemoryId> {
    Uuid::parse_str(id).map_err(|e| RecallError::Backend(format!("invalid backend id '{}': {}", id, e)))
}

/// Normalize a list response (keyed envelope or bare sequence) into items
pub fn normalize_list_response(value: serde_json::Value) -> Result<Vec<BackendItem>> {
    let envelope: WireEnvelope = serde_json::from_value(value)
        .map_err(|e| RecallError::Backend(format!("unexpected list response shape: {}", e)))?;

    envelope
        .into_items()
        .into_iter()
        .map(|item| {
            Ok(BackendItem {
                id: parse_backend_id(&item.id)?,
                content: item.content,
                hash: item.hash,
                created_at: item.created_at,
                updated_at: item.updated_at,
            })
        })
        .collect()
}

/// Raw upsert result row on the wire
#[derive(Debug, Deserialize)]
struct WireOutcome {
    id: String,
    event: MemoryEvent,
    #[serde(rename = "memory", alias = "content", default)]
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireOutcomeEnvelope {
    Keyed { results: Vec<WireOutcome> },
    Bare(Vec<WireOutcome>),
}

/// Normalize an upsert response into typed outcomes
pub fn normalize_upsert_response(value: serde_json::Value) -> Result<Vec<UpsertOutcome>> {
    let envelope: WireOutcomeEnvelope = serde_json::from_value(value)
        .map_err(|e| RecallError::Backend(format!("unexpected upsert response shape: {}", e)))?;

    let outcomes = match envelope {
        WireOutcomeEnvelope::Keyed { results } => results,
        WireOutcomeEnvelope::Bare(items) => items,
    };

    outcomes
        .into_iter()
        .map(|o| {
            Ok(UpsertOutcome {
                id: parse_backend_id(&o.id)?,
                event: o.event,
                content: o.content,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_keyed_and_bare_shapes_agree() {
        let id = Uuid::new_v4().to_string();
        let keyed = json!({"results": [{"id": id, "memory": "likes tea", "hash": "h1"}]});
        let bare = json!([{"id": id, "memory": "likes tea", "hash": "h1"}]);

        let a = normalize_list_response(keyed).unwrap();
        let b = normalize_list_response(bare).unwrap();

        assert_eq!(a.len(), 1);
        assert_eq!(a[0].id, b[0].id);
        assert_eq!(a[0].content, b[0].content);
        assert_eq!(a[0].hash, b[0].hash);
    }

    #[test]
    fn test_normalize_rejects_garbage_id() {
        let bare = json!([{"id": "not-a-uuid", "memory": "x"}]);
        assert!(normalize_list_response(bare).is_err());
    }

    #[test]
    fn test_upsert_events_deserialize_uppercase() {
        let id = Uuid::new_v4().to_string();
        let value = json!({"results": [
            {"id": id, "event": "ADD", "memory": "likes tea"},
            {"id": id, "event": "NOOP", "memory": ""}
        ]});
        let outcomes = normalize_upsert_response(value).unwrap();
        assert_eq!(outcomes[0].event, MemoryEvent::Add);
        assert_eq!(outcomes[1].event, MemoryEvent::Noop);
    }

    #[test]
    fn test_content_alias() {
        let id = Uuid::new_v4().to_string();
        let bare = json!([{"id": id, "content": "aliased"}]);
        let items = normalize_list_response(bare).unwrap();
        assert_eq!(items[0].content, "aliased");
    }
}
