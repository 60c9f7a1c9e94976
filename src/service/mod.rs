//! Operation envelope
//!
//! Wraps every externally-invoked operation (add/search/list/delete/
//! delete-all) with the identity and permission gate, input bounding, a hard
//! deadline against the vector backend, and reconciliation of backend
//! outcomes into the ledger.
//!
//! Ordering contract: the backend call runs to completion (or is abandoned at
//! the deadline) before any ledger mutation begins, and no lock is held
//! across it. A timed-out operation therefore leaves zero ledger mutations.

mod input;

pub use input::{bound_input, truncate_text, BoundedInput, TRUNCATION_MARKER};

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::acl::{self, PolicyStore};
use crate::backend::{SearchHit, UpsertOutcome, VectorBackend};
use crate::error::{RecallError, Result};
use crate::storage::{access_log, identity, ledger, Storage};
use crate::types::{content_hash, AccessKind, App, MemoryId, ServiceConfig, User};

/// Identity context for one tool invocation, passed explicitly through the
/// call chain (never ambient state)
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    pub user_id: Option<String>,
    pub client_name: Option<String>,
}

impl OperationContext {
    pub fn new(user_id: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            client_name: Some(client_name.into()),
        }
    }

    fn require(&self) -> Result<(&str, &str)> {
        let uid = self
            .user_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(RecallError::MissingIdentity("user_id"))?;
        let client = self
            .client_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(RecallError::MissingIdentity("client_name"))?;
        Ok((uid, client))
    }
}

/// Result of an add operation: the backend's raw per-item outcomes plus
/// bounding observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddResult {
    pub results: Vec<UpsertOutcome>,
    pub truncated: bool,
    pub original_len: usize,
    pub final_len: usize,
}

/// One ranked search result, in backend order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: MemoryId,
    pub memory: Option<String>,
    pub hash: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub score: f64,
}

/// One listed memory after accessibility filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListedMemory {
    pub id: MemoryId,
    pub memory: String,
    pub hash: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Counts reported by a delete / delete-all operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteReport {
    /// Ids transitioned to `deleted` in the ledger
    pub deleted: usize,
    /// Ids whose backend delete failed (the ledger transition still applied)
    pub backend_failures: usize,
    /// Requested ids that were inaccessible, unknown, or already deleted
    pub skipped: usize,
}

/// The memory service: storage, backend handle, policy, and an immutable
/// configuration snapshot, all injected explicitly
pub struct MemoryService {
    storage: Storage,
    backend: Option<Arc<dyn VectorBackend>>,
    policy: Arc<dyn PolicyStore>,
    config: ServiceConfig,
}

impl MemoryService {
    pub fn new(
        storage: Storage,
        backend: Option<Arc<dyn VectorBackend>>,
        policy: Arc<dyn PolicyStore>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            storage,
            backend,
            policy,
            config,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn backend(&self) -> Result<Arc<dyn VectorBackend>> {
        self.backend.clone().ok_or(RecallError::BackendUnavailable)
    }

    fn resolve(&self, ctx: &OperationContext) -> Result<(User, App)> {
        let (uid, client) = ctx.require()?;
        self.storage
            .with_connection(|conn| identity::resolve(conn, uid, client))
    }

    /// Run a backend call on its own task under the configured deadline.
    ///
    /// On expiry the join handle is dropped: the call is abandoned, not
    /// cancelled, and its eventual backend-side effects are an accepted
    /// inconsistency window. The ledger has not been touched at that point.
    async fn bounded<T, F>(&self, fut: F, started: Instant) -> Result<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let deadline = Duration::from_secs(self.config.operation_timeout_secs);
        let handle = tokio::spawn(fut);
        match tokio::time::timeout(deadline, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(RecallError::Backend(format!(
                "backend task failed: {}",
                join_err
            ))),
            Err(_) => {
                let elapsed_secs = started.elapsed().as_secs_f64();
                tracing::error!(elapsed_secs, "backend call exceeded deadline, abandoning");
                Err(RecallError::Timeout { elapsed_secs })
            }
        }
    }

    /// The user's memories and the subset of ids accessible to `app`
    fn accessible_set(&self, user: &User, app: &App) -> Result<HashSet<MemoryId>> {
        let memories = self
            .storage
            .with_connection(|conn| ledger::memories_for_user(conn, user.id))?;
        let ids = acl::accessible_ids(&memories, app, self.policy.as_ref());
        tracing::debug!(
            total = memories.len(),
            accessible = ids.len(),
            "evaluated accessibility"
        );
        Ok(ids.into_iter().collect())
    }

    /// Add a memory: bound the input, upsert via the backend under deadline,
    /// then reconcile every reported outcome in a single ledger transaction.
    pub async fn add(&self, ctx: &OperationContext, text: &str) -> Result<AddResult> {
        let started = Instant::now();
        let (user, app) = self.resolve(ctx)?;
        tracing::info!(user = %user.external_id, app = %app.external_id, text_len = text.len(), "add started");

        if !app.is_active {
            return Err(RecallError::InactiveApp {
                app: app.name.clone(),
            });
        }

        let bounded = bound_input(text, &self.config)?;
        let backend = self.backend()?;

        let upsert_text = bounded.text.clone();
        let uid = user.external_id.clone();
        let metadata = json!({ "source_app": "recall", "mcp_client": app.external_id });
        let outcomes = self
            .bounded(
                async move { backend.upsert(&upsert_text, &uid, metadata).await },
                started,
            )
            .await?;

        tracing::info!(
            count = outcomes.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "backend upsert completed"
        );

        // Whole-batch reconciliation: all outcomes commit or none do.
        self.storage.with_transaction(|conn| {
            for outcome in &outcomes {
                ledger::apply_outcome(conn, outcome, user.id, app.id)?;
            }
            Ok(())
        })?;

        tracing::info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            "add completed"
        );
        Ok(AddResult {
            results: outcomes,
            truncated: bounded.truncated,
            original_len: bounded.original_len,
            final_len: bounded.final_len,
        })
    }

    /// Search: backend similarity hits, filtered to accessible memories, in
    /// backend-ranked order. Each retained hit is access-logged.
    pub async fn search(&self, ctx: &OperationContext, query: &str) -> Result<Vec<SearchResult>> {
        let started = Instant::now();
        let (user, app) = self.resolve(ctx)?;
        tracing::info!(user = %user.external_id, app = %app.external_id, query_len = query.len(), "search started");

        let allowed = self.accessible_set(&user, &app)?;
        let backend = self.backend()?;

        let q = query.to_string();
        let uid = user.external_id.clone();
        let limit = self.config.search_limit;
        let hits: Vec<SearchHit> = self
            .bounded(async move { backend.search(&q, &uid, limit).await }, started)
            .await?;

        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter_map(|hit| {
                let id = hit.id?;
                if !allowed.contains(&id) {
                    tracing::debug!(memory_id = %id, "skipping hit (not accessible)");
                    return None;
                }
                // Backends are not required to carry the content hash; fill
                // it from the content so callers always get one.
                let hash = hit
                    .hash
                    .or_else(|| hit.content.as_deref().map(content_hash));
                Some(SearchResult {
                    id,
                    memory: hit.content,
                    hash,
                    created_at: hit.created_at,
                    updated_at: hit.updated_at,
                    score: hit.score,
                })
            })
            .collect();

        self.storage.with_transaction(|conn| {
            for r in &results {
                access_log::log_access(
                    conn,
                    r.id,
                    app.id,
                    AccessKind::Search,
                    &json!({ "query": query, "score": r.score, "hash": r.hash }),
                )?;
            }
            Ok(())
        })?;

        tracing::info!(
            results = results.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "search completed"
        );
        Ok(results)
    }

    /// List all of the user's memories held by the backend, filtered by
    /// accessibility. One access log entry per retained item.
    pub async fn list(&self, ctx: &OperationContext) -> Result<Vec<ListedMemory>> {
        let started = Instant::now();
        let (user, app) = self.resolve(ctx)?;
        tracing::info!(user = %user.external_id, app = %app.external_id, "list started");

        let allowed = self.accessible_set(&user, &app)?;
        let backend = self.backend()?;

        let uid = user.external_id.clone();
        let items = self
            .bounded(async move { backend.list_all(&uid).await }, started)
            .await?;

        let filtered: Vec<ListedMemory> = items
            .into_iter()
            .filter(|item| allowed.contains(&item.id))
            .map(|item| {
                let hash = item
                    .hash
                    .or_else(|| Some(content_hash(&item.content)));
                ListedMemory {
                    id: item.id,
                    hash,
                    memory: item.content,
                    created_at: item.created_at,
                    updated_at: item.updated_at,
                }
            })
            .collect();

        self.storage.with_transaction(|conn| {
            for item in &filtered {
                access_log::log_access(
                    conn,
                    item.id,
                    app.id,
                    AccessKind::List,
                    &json!({ "hash": item.hash }),
                )?;
            }
            Ok(())
        })?;

        tracing::info!(
            memories = filtered.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "list completed"
        );
        Ok(filtered)
    }

    /// Delete specific memories by id
    pub async fn delete(&self, ctx: &OperationContext, ids: &[MemoryId]) -> Result<DeleteReport> {
        self.delete_targets(ctx, Some(ids), AccessKind::Delete).await
    }

    /// Delete every memory accessible to the requesting app
    pub async fn delete_all(&self, ctx: &OperationContext) -> Result<DeleteReport> {
        self.delete_targets(ctx, None, AccessKind::DeleteAll).await
    }

    async fn delete_targets(
        &self,
        ctx: &OperationContext,
        requested: Option<&[MemoryId]>,
        kind: AccessKind,
    ) -> Result<DeleteReport> {
        let started = Instant::now();
        let (user, app) = self.resolve(ctx)?;
        tracing::info!(user = %user.external_id, app = %app.external_id, kind = kind.as_str(), "delete started");

        let allowed = self.accessible_set(&user, &app)?;
        let targets: Vec<MemoryId> = match requested {
            Some(ids) => ids.iter().filter(|id| allowed.contains(id)).copied().collect(),
            None => allowed.iter().copied().collect(),
        };
        let requested_count = requested.map(|ids| ids.len()).unwrap_or(targets.len());

        if targets.is_empty() {
            // Deleting everything when nothing is accessible succeeds as a
            // no-op; an explicit id set matching nothing is the caller's error.
            if requested.is_some() {
                tracing::warn!("no accessible memories matched the delete request");
                return Err(RecallError::NotFoundOrInaccessible);
            }
            return Ok(DeleteReport {
                deleted: 0,
                backend_failures: 0,
                skipped: 0,
            });
        }

        // Backend deletes first; failures are counted, never block the ledger
        // transition, since the content must stop being served regardless.
        let backend = self.backend()?;
        let backend_targets = targets.clone();
        let failures: Vec<MemoryId> = self
            .bounded(
                async move {
                    let mut failed = Vec::new();
                    for id in &backend_targets {
                        if let Err(e) = backend.delete(*id).await {
                            tracing::warn!(memory_id = %id, error = %e, "backend delete failed");
                            failed.push(*id);
                        }
                    }
                    Ok(failed)
                },
                started,
            )
            .await?;

        let operation = kind.as_str();
        let deleted = self.storage.with_transaction(|conn| {
            let mut deleted = 0usize;
            for id in &targets {
                if ledger::mark_deleted(conn, *id, user.id)? {
                    access_log::log_access(conn, *id, app.id, kind, &json!({ "operation": operation }))?;
                    deleted += 1;
                }
            }
            Ok(deleted)
        })?;

        let report = DeleteReport {
            deleted,
            backend_failures: failures.len(),
            skipped: requested_count.saturating_sub(deleted),
        };
        tracing::info!(
            deleted = report.deleted,
            backend_failures = report.backend_failures,
            skipped = report.skipped,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "delete completed"
        );
        Ok(report)
    }
}
