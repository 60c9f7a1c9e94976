//! Identity resolution (user + app)
//!
//! Resolves an opaque (user-identifier, app-identifier) pair into durable
//! rows, creating them on first sight. Creation races are settled by the
//! unique constraints: a losing concurrent creator falls back to a lookup.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{App, User, UserId};

/// Resolve or lazily create the (User, App) pair for an invocation
pub fn resolve(conn: &Connection, user_external_id: &str, app_external_id: &str) -> Result<(User, App)> {
    let user = resolve_user(conn, user_external_id)?;
    let app = resolve_app(conn, user.id, app_external_id)?;
    Ok((user, app))
}

fn resolve_user(conn: &Connection, external_id: &str) -> Result<User> {
    if let Some(user) = find_user(conn, external_id)? {
        return Ok(user);
    }

    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (id, external_id, name, created_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(external_id) DO NOTHING",
        params![
            Uuid::new_v4().to_string(),
            external_id,
            external_id,
            now.to_rfc3339()
        ],
    )?;

    // Either our insert landed or a concurrent creator won; the row exists now.
    find_user(conn, external_id)?.ok_or_else(|| {
        crate::error::RecallError::Backend(format!("user row vanished for '{}'", external_id))
    })
}

fn resolve_app(conn: &Connection, owner_id: UserId, external_id: &str) -> Result<App> {
    if let Some(app) = find_app(conn, owner_id, external_id)? {
        return Ok(app);
    }

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO apps (id, owner_id, external_id, name, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, 1, ?, ?)
         ON CONFLICT(owner_id, external_id) DO NOTHING",
        params![
            Uuid::new_v4().to_string(),
            owner_id.to_string(),
            external_id,
            external_id,
            now,
            now
        ],
    )?;

    find_app(conn, owner_id, external_id)?.ok_or_else(|| {
        crate::error::RecallError::Backend(format!("app row vanished for '{}'", external_id))
    })
}

fn find_user(conn: &Connection, external_id: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, external_id, name, created_at FROM users WHERE external_id = ?",
            params![external_id],
            |row| {
                Ok(User {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    external_id: row.get(1)?,
                    name: row.get(2)?,
                    created_at: parse_ts(row.get::<_, String>(3)?),
                })
            },
        )
        .optional()?;
    Ok(user)
}

fn find_app(conn: &Connection, owner_id: UserId, external_id: &str) -> Result<Option<App>> {
    let app = conn
        .query_row(
            "SELECT id, owner_id, external_id, name, is_active, created_at, updated_at
             FROM apps WHERE owner_id = ? AND external_id = ?",
            params![owner_id.to_string(), external_id],
            |row| {
                Ok(App {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    owner_id: parse_uuid(row.get::<_, String>(1)?),
                    external_id: row.get(2)?,
                    name: row.get(3)?,
                    is_active: row.get::<_, i64>(4)? != 0,
                    created_at: parse_ts(row.get::<_, String>(5)?),
                    updated_at: parse_ts(row.get::<_, String>(6)?),
                })
            },
        )
        .optional()?;
    Ok(app)
}

/// Mark an app paused or active (used by tests and administrative tooling)
pub fn set_app_active(conn: &Connection, app_id: Uuid, is_active: bool) -> Result<()> {
    conn.execute(
        "UPDATE apps SET is_active = ?, updated_at = ? WHERE id = ?",
        params![
            is_active as i64,
            Utc::now().to_rfc3339(),
            app_id.to_string()
        ],
    )?;
    Ok(())
}

pub(crate) fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_default()
}

pub(crate) fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
