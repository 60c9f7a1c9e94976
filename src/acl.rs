//! Access control evaluation
//!
//! A pure predicate over stored permission grants plus default policy. The
//! grant store is an injected, read-only capability; this module never writes.
//!
//! Policy: an app may access any active memory owned by the same user that
//! created the app, unless an explicit deny grant exists for that (memory,
//! app) pair. An explicit allow grant overrides an implicit deny between
//! different owning apps. Evaluated per memory; the app's own `is_active`
//! flag plays no role here (a paused app may still read).

use std::collections::HashMap;

use crate::types::{App, AppId, Memory, MemoryId, MemoryState};

/// An explicit grant decision for one (memory, app) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantDecision {
    Allow,
    Deny,
}

/// Read-only permission grant lookup, consumed from an external policy store
pub trait PolicyStore: Send + Sync {
    /// The explicit grant for a (memory, app) pair, if any
    fn grant_for(&self, memory_id: MemoryId, app_id: AppId) -> Option<GrantDecision>;
}

/// Default policy: no explicit grants at all
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenPolicy;

impl PolicyStore for OpenPolicy {
    fn grant_for(&self, _memory_id: MemoryId, _app_id: AppId) -> Option<GrantDecision> {
        None
    }
}

/// In-memory grant table, for composition and tests
#[derive(Debug, Clone, Default)]
pub struct StaticPolicy {
    grants: HashMap<(MemoryId, AppId), GrantDecision>,
}

impl StaticPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grant(mut self, memory_id: MemoryId, app_id: AppId, decision: GrantDecision) -> Self {
        self.grants.insert((memory_id, app_id), decision);
        self
    }
}

impl PolicyStore for StaticPolicy {
    fn grant_for(&self, memory_id: MemoryId, app_id: AppId) -> Option<GrantDecision> {
        self.grants.get(&(memory_id, app_id)).copied()
    }
}

/// Whether `app` may access `memory`
///
/// Pure function of the memory, the requesting app, and the grant store.
/// Safe to call concurrently and repeatedly; no side effects.
pub fn is_accessible(memory: &Memory, app: &App, policy: &dyn PolicyStore) -> bool {
    // Cross-user access is never grantable: the memory must belong to the
    // user that owns the requesting app.
    if memory.user_id != app.owner_id {
        return false;
    }

    // Only active memories are servable; deleted/paused/archived content must
    // stop being returned regardless of grants.
    if memory.state != MemoryState::Active {
        return false;
    }

    match policy.grant_for(memory.id, app.id) {
        Some(GrantDecision::Deny) => false,
        Some(GrantDecision::Allow) => true,
        // Default-open within the owning user's memories.
        None => true,
    }
}

/// Filter memories down to those accessible to an app
pub fn accessible_ids(memories: &[Memory], app: &App, policy: &dyn PolicyStore) -> Vec<MemoryId> {
    memories
        .iter()
        .filter(|m| is_accessible(m, app, policy))
        .map(|m| m.id)
        .collect()
}
