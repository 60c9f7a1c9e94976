//! Lifecycle ledger: the Memory state machine and its audit trail
//!
//! The ledger is authoritative for visibility even when the vector backend
//! disagrees. Every transition to `active` or `deleted` appends exactly one
//! history row in the same transaction as the memory row mutation; callers
//! wrap batches in `Storage::with_transaction` so partial application is
//! structurally impossible.
//!
//! Legal transitions:
//!   (none)  -> active   genesis
//!   active  -> active   backend-reported ADD for an existing id (content overwrite)
//!   active  -> deleted  explicit delete / backend-reported DELETE
//!   deleted -> active   backend-reported ADD reusing a deleted id (resurrection)
//!
//! UPDATE and NOOP outcomes touch neither state nor history.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::identity::{parse_ts, parse_uuid};
use crate::backend::{MemoryEvent, UpsertOutcome};
use crate::error::Result;
use crate::types::{AppId, Memory, MemoryId, MemoryState, StatusHistory, UserId};

/// Whether a transition is a legal walk of the state machine
pub fn transition_allowed(from: Option<MemoryState>, to: MemoryState) -> bool {
    match (from, to) {
        (None, MemoryState::Active) => true,
        (Some(MemoryState::Active), MemoryState::Active) => true,
        (Some(MemoryState::Active), MemoryState::Deleted) => true,
        (Some(MemoryState::Deleted), MemoryState::Active) => true,
        _ => false,
    }
}

/// Fetch one memory by id
pub fn get_memory(conn: &Connection, id: MemoryId) -> Result<Option<Memory>> {
    let memory = conn
        .query_row(
            "SELECT id, user_id, app_id, content, state, metadata, created_at, updated_at, deleted_at
             FROM memories WHERE id = ?",
            params![id.to_string()],
            map_memory_row,
        )
        .optional()?;
    Ok(memory)
}

/// Fetch all memories owned by a user, regardless of state
pub fn memories_for_user(conn: &Connection, user_id: UserId) -> Result<Vec<Memory>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, app_id, content, state, metadata, created_at, updated_at, deleted_at
         FROM memories WHERE user_id = ? ORDER BY created_at",
    )?;
    let memories = stmt
        .query_map(params![user_id.to_string()], map_memory_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(memories)
}

fn map_memory_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let state_str: String = row.get(4)?;
    let metadata_str: String = row.get(5)?;
    let deleted_at: Option<String> = row.get(8)?;

    Ok(Memory {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: parse_uuid(row.get::<_, String>(1)?),
        app_id: parse_uuid(row.get::<_, String>(2)?),
        content: row.get(3)?,
        state: state_str.parse().unwrap_or_default(),
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
        created_at: parse_ts(row.get::<_, String>(6)?),
        updated_at: parse_ts(row.get::<_, String>(7)?),
        deleted_at: deleted_at.map(parse_ts),
    })
}

/// Apply one backend-reported upsert outcome as a ledger transition
///
/// Must be called inside a transaction covering the whole batch. Returns
/// whether the outcome produced a state transition (and thus a history row).
pub fn apply_outcome(
    conn: &Connection,
    outcome: &UpsertOutcome,
    user_id: UserId,
    app_id: AppId,
) -> Result<bool> {
    let existing = get_memory(conn, outcome.id)?;

    match outcome.event {
        MemoryEvent::Add => {
            let now = Utc::now().to_rfc3339();
            match &existing {
                None => {
                    tracing::info!(memory_id = %outcome.id, "creating new memory");
                    conn.execute(
                        "INSERT INTO memories (id, user_id, app_id, content, state, metadata, created_at, updated_at)
                         VALUES (?, ?, ?, ?, 'active', '{}', ?, ?)",
                        params![
                            outcome.id.to_string(),
                            user_id.to_string(),
                            app_id.to_string(),
                            outcome.content,
                            now,
                            now
                        ],
                    )?;
                    append_history(conn, outcome.id, user_id, None, MemoryState::Active)?;
                }
                Some(memory) => {
                    // Content overwrite for an active id, or resurrection of a
                    // deleted one; the backend owns identity reuse.
                    tracing::info!(memory_id = %outcome.id, old_state = %memory.state, "reactivating memory");
                    conn.execute(
                        "UPDATE memories SET content = ?, state = 'active', deleted_at = NULL, updated_at = ?
                         WHERE id = ?",
                        params![outcome.content, now, outcome.id.to_string()],
                    )?;
                    append_history(
                        conn,
                        outcome.id,
                        user_id,
                        Some(memory.state),
                        MemoryState::Active,
                    )?;
                }
            }
            Ok(true)
        }
        MemoryEvent::Delete => {
            if existing.is_some() {
                tracing::info!(memory_id = %outcome.id, "backend-reported delete");
                mark_deleted(conn, outcome.id, user_id)
            } else {
                Ok(false)
            }
        }
        MemoryEvent::Update => {
            tracing::debug!(memory_id = %outcome.id, "backend-side update, no transition");
            Ok(false)
        }
        MemoryEvent::Noop => {
            tracing::debug!(memory_id = %outcome.id, "noop (duplicate or unchanged)");
            Ok(false)
        }
    }
}

/// Transition a memory `active -> deleted`, appending the history row
///
/// Returns false without touching anything if the memory is missing or not
/// currently active, so a losing concurrent deleter observes the applied
/// state instead of corrupting history ordering.
pub fn mark_deleted(conn: &Connection, memory_id: MemoryId, changed_by: UserId) -> Result<bool> {
    let current = get_memory(conn, memory_id)?;
    let memory = match current {
        Some(m) if m.state == MemoryState::Active => m,
        _ => return Ok(false),
    };

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE memories SET state = 'deleted', deleted_at = ?, updated_at = ? WHERE id = ? AND state = 'active'",
        params![now, now, memory_id.to_string()],
    )?;
    append_history(conn, memory_id, changed_by, Some(memory.state), MemoryState::Deleted)?;
    Ok(true)
}

fn append_history(
    conn: &Connection,
    memory_id: MemoryId,
    changed_by: UserId,
    old_state: Option<MemoryState>,
    new_state: MemoryState,
) -> Result<()> {
    debug_assert!(transition_allowed(old_state, new_state));

    conn.execute(
        "INSERT INTO status_history (memory_id, changed_by, old_state, new_state, changed_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
            memory_id.to_string(),
            changed_by.to_string(),
            old_state.map(|s| s.to_string()),
            new_state.to_string(),
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// History rows for a memory in application order
pub fn history_for_memory(conn: &Connection, memory_id: MemoryId) -> Result<Vec<StatusHistory>> {
    let mut stmt = conn.prepare(
        "SELECT id, memory_id, changed_by, old_state, new_state, changed_at
         FROM status_history WHERE memory_id = ? ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![memory_id.to_string()], |row| {
            let old_state: Option<String> = row.get(3)?;
            let new_state: String = row.get(4)?;
            Ok(StatusHistory {
                id: row.get(0)?,
                memory_id: parse_uuid(row.get::<_, String>(1)?),
                changed_by: parse_uuid(row.get::<_, String>(2)?),
                old_state: old_state.and_then(|s| s.parse().ok()),
                new_state: new_state.parse().unwrap_or_default(),
                changed_at: parse_ts(row.get::<_, String>(5)?),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Check the chain invariant: each row's old_state equals the previous row's
/// new_state, the first row is genesis, and every step is a legal transition
pub fn verify_history_chain(history: &[StatusHistory]) -> bool {
    let mut previous: Option<MemoryState> = None;
    for row in history {
        if row.old_state != previous || !transition_allowed(row.old_state, row.new_state) {
            return false;
        }
        previous = Some(row.new_state);
    }
    // An existing memory must have a genesis row
    !history.is_empty()
}
