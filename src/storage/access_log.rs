//! Append-only access log
//!
//! Records every successful read/search/list/delete touching a memory, keyed
//! by the requesting app. Never mutated or deleted; audit and analytics only.

use chrono::Utc;
use rusqlite::{params, Connection};

use super::identity::{parse_ts, parse_uuid};
use crate::error::Result;
use crate::types::{AccessKind, AccessLogEntry, AppId, MemoryId};

/// Append one access log entry
pub fn log_access(
    conn: &Connection,
    memory_id: MemoryId,
    app_id: AppId,
    kind: AccessKind,
    context: &serde_json::Value,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO access_log (memory_id, app_id, access_kind, accessed_at, context)
         VALUES (?, ?, ?, ?, ?)",
        params![
            memory_id.to_string(),
            app_id.to_string(),
            kind.as_str(),
            Utc::now().to_rfc3339(),
            context.to_string()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Entries for one memory, newest first
pub fn entries_for_memory(conn: &Connection, memory_id: MemoryId) -> Result<Vec<AccessLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, memory_id, app_id, access_kind, accessed_at, context
         FROM access_log WHERE memory_id = ? ORDER BY id DESC",
    )?;
    let entries = stmt
        .query_map(params![memory_id.to_string()], map_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Entries recorded by one app, newest first
pub fn entries_for_app(conn: &Connection, app_id: AppId, limit: i64) -> Result<Vec<AccessLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, memory_id, app_id, access_kind, accessed_at, context
         FROM access_log WHERE app_id = ? ORDER BY id DESC LIMIT ?",
    )?;
    let entries = stmt
        .query_map(params![app_id.to_string(), limit], map_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

fn map_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccessLogEntry> {
    let kind: String = row.get(3)?;
    let context: String = row.get(5)?;
    Ok(AccessLogEntry {
        id: row.get(0)?,
        memory_id: parse_uuid(row.get::<_, String>(1)?),
        app_id: parse_uuid(row.get::<_, String>(2)?),
        access_kind: kind.parse().unwrap_or(AccessKind::List),
        accessed_at: parse_ts(row.get::<_, String>(4)?),
        context: serde_json::from_str(&context).unwrap_or(serde_json::Value::Null),
    })
}
