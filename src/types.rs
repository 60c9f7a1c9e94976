//! Core types for Recall

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a memory (assigned by the vector backend on upsert,
/// reconciled into the ledger by id)
pub type MemoryId = Uuid;

/// Unique identifier for a user
pub type UserId = Uuid;

/// Unique identifier for an app
pub type AppId = Uuid;

/// A durable user identity
///
/// Created lazily on the first operation referencing an unknown external
/// identifier. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// External user identifier (unique)
    pub external_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A named client context under a user (e.g. one MCP integration)
///
/// `is_active = false` blocks new-memory creation for this app but not reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub id: AppId,
    pub owner_id: UserId,
    /// External app identifier (unique per owning user)
    pub external_id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A memory entry in the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    /// Owning user
    pub user_id: UserId,
    /// App that created the memory
    pub app_id: AppId,
    /// Textual content
    pub content: String,
    /// Lifecycle state
    pub state: MemoryState,
    /// Arbitrary metadata as JSON
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set if and only if `state` is `Deleted`
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Memory lifecycle state
///
/// `Deleted` is terminal for explicit deletes; the only way out is a
/// backend-reported ADD reusing the id (resurrection), since the backend is
/// the source of truth for identity reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryState {
    #[default]
    Active,
    Paused,
    Archived,
    Deleted,
}

impl std::fmt::Display for MemoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryState::Active => write!(f, "active"),
            MemoryState::Paused => write!(f, "paused"),
            MemoryState::Archived => write!(f, "archived"),
            MemoryState::Deleted => write!(f, "deleted"),
        }
    }
}

impl std::str::FromStr for MemoryState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(MemoryState::Active),
            "paused" => Ok(MemoryState::Paused),
            "archived" => Ok(MemoryState::Archived),
            "deleted" => Ok(MemoryState::Deleted),
            _ => Err(format!("Unknown memory state: {}", s)),
        }
    }
}

/// Immutable record of one lifecycle transition
///
/// For a given memory, ordered by `changed_at`, each row's `old_state` equals
/// the previous row's `new_state` (null for genesis).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistory {
    pub id: i64,
    pub memory_id: MemoryId,
    /// User who caused the change
    pub changed_by: UserId,
    /// None for the genesis row
    pub old_state: Option<MemoryState>,
    pub new_state: MemoryState,
    pub changed_at: DateTime<Utc>,
}

/// Kind of access recorded in the access log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Search,
    List,
    Delete,
    DeleteAll,
}

impl AccessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessKind::Search => "search",
            AccessKind::List => "list",
            AccessKind::Delete => "delete",
            AccessKind::DeleteAll => "delete_all",
        }
    }
}

impl std::str::FromStr for AccessKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search" => Ok(AccessKind::Search),
            "list" => Ok(AccessKind::List),
            "delete" => Ok(AccessKind::Delete),
            "delete_all" => Ok(AccessKind::DeleteAll),
            _ => Err(format!("Unknown access kind: {}", s)),
        }
    }
}

/// Append-only audit record of a successful read or delete touching a memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub id: i64,
    pub memory_id: MemoryId,
    /// App that performed the access
    pub app_id: AppId,
    pub access_kind: AccessKind,
    pub accessed_at: DateTime<Utc>,
    /// Opaque context payload (e.g. query and match score)
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Storage configuration for the SQLite ledger
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to the database, or ":memory:"
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: ":memory:".to_string(),
        }
    }
}

/// Immutable service configuration snapshot, built once at startup
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Hard wall-clock deadline for any call into the vector backend
    pub operation_timeout_secs: u64,
    /// Maximum input text length in characters
    pub max_input_len: usize,
    /// Truncate long input instead of rejecting it
    pub truncate_long_input: bool,
    /// Top-K limit for semantic search
    pub search_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: 120,
            max_input_len: 8000,
            truncate_long_input: true,
            search_limit: 10,
        }
    }
}

/// Compute the content hash used in search payloads (SHA256 of normalized content)
pub fn content_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};

    let normalized = content
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
