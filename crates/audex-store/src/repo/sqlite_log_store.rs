//! SQLite-backed log entry store
//!
//! Changes are stored as the JSON document produced by
//! `LogEntry::changes_json`. Timestamps are RFC 3339 with nanosecond
//! precision, so lexical order on `created_at` is chronological order.

use crate::db;
use crate::errors::{corrupt_row, from_rusqlite, not_stored, Result};
use crate::migrations::apply_migrations;
use audex_core::errors::Result as AuditResult;
use audex_core::model::{ActionKind, EntityRef, LogEntry, LogEntryId};
use audex_core::LogEntryStore;
use audex_core_types::ActorId;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SELECT_COLUMNS: &str = "SELECT id, target_type, target_id, anchor_type, anchor_id, \
     created_at, actor_id, action, request_id, changes FROM log_entries";

const INSERT_SQL: &str = "INSERT INTO log_entries \
     (target_type, target_id, anchor_type, anchor_id, created_at, actor_id, action, request_id, changes) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

const UPDATE_SQL: &str = "UPDATE log_entries SET changes = ?2 WHERE id = ?1";

/// Log entry store over one SQLite connection
pub struct SqliteLogStore {
    conn: Connection,
}

impl SqliteLogStore {
    /// Open (or create) a database file and bring its schema up to date
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = db::open(path)?;
        db::configure(&conn)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(db::open_in_memory()?)
    }

    /// Wrap an existing connection, applying pending migrations
    pub fn from_connection(mut conn: Connection) -> Result<Self> {
        apply_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn get(&self, id: LogEntryId) -> Result<Option<LogEntry>> {
        let raw = self
            .conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                [id],
                RawEntry::from_row,
            )
            .optional()
            .map_err(from_rusqlite)?;
        raw.map(RawEntry::into_entry).transpose()
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM log_entries", [], |row| row.get(0))
            .map_err(from_rusqlite)?;
        Ok(count as usize)
    }

    /// Insert one row; the caller assigns the returned id once it is durable
    fn insert_entry(conn: &Connection, entry: &LogEntry) -> Result<LogEntryId> {
        let changes = encode_changes(entry)?;
        conn.execute(
            INSERT_SQL,
            params![
                entry.target.entity_type,
                entry.target.id,
                entry.anchor.entity_type,
                entry.anchor.id,
                encode_time(&entry.created_at),
                entry.actor.map(|a| a.get()),
                entry.action.as_str(),
                entry.request_id,
                changes,
            ],
        )
        .map_err(from_rusqlite)?;

        Ok(conn.last_insert_rowid())
    }

    fn update_entry(conn: &Connection, entry: &LogEntry) -> Result<()> {
        let id = entry.id.ok_or_else(|| not_stored("log_entry_update"))?;
        let updated = conn
            .execute(UPDATE_SQL, params![id, encode_changes(entry)?])
            .map_err(from_rusqlite)?;
        if updated == 0 {
            return Err(not_stored("log_entry_update"));
        }
        Ok(())
    }
}

impl LogEntryStore for SqliteLogStore {
    fn insert(&mut self, entry: &mut LogEntry) -> AuditResult<LogEntryId> {
        let id = Self::insert_entry(&self.conn, entry)?;
        entry.id = Some(id);
        Ok(id)
    }

    fn update_changes(&mut self, entry: &LogEntry) -> AuditResult<()> {
        Ok(Self::update_entry(&self.conn, entry)?)
    }

    fn insert_many(&mut self, entries: &mut [&mut LogEntry]) -> AuditResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction().map_err(from_rusqlite)?;
        let ids = entries
            .iter()
            .map(|entry| Self::insert_entry(&tx, entry))
            .collect::<Result<Vec<_>>>()?;
        tx.commit().map_err(from_rusqlite)?;

        // A rolled-back batch leaves every entry unsaved
        for (entry, id) in entries.iter_mut().zip(ids) {
            entry.id = Some(id);
        }

        tracing::debug!(count = entries.len(), "log entries inserted in batch");
        Ok(())
    }

    fn update_many(&mut self, entries: &[&LogEntry]) -> AuditResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction().map_err(from_rusqlite)?;
        for entry in entries {
            Self::update_entry(&tx, entry)?;
        }
        tx.commit().map_err(from_rusqlite)?;

        tracing::debug!(count = entries.len(), "log entries updated in batch");
        Ok(())
    }

    fn entries_for_anchor(&self, anchor: &EntityRef) -> AuditResult<Vec<LogEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{} WHERE anchor_type = ?1 AND anchor_id = ?2 ORDER BY created_at DESC, id DESC",
                SELECT_COLUMNS
            ))
            .map_err(from_rusqlite)?;
        let rows = stmt
            .query_map(params![anchor.entity_type, anchor.id], RawEntry::from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        let entries = rows
            .into_iter()
            .map(RawEntry::into_entry)
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn delete_for_anchor(
        &mut self,
        anchor: &EntityRef,
        keep: Option<LogEntryId>,
    ) -> AuditResult<usize> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM log_entries
                 WHERE anchor_type = ?1 AND anchor_id = ?2 AND (?3 IS NULL OR id != ?3)",
                params![anchor.entity_type, anchor.id, keep],
            )
            .map_err(from_rusqlite)?;
        Ok(deleted)
    }

    fn reassign_actor(&mut self, from: ActorId, to: ActorId) -> AuditResult<usize> {
        let updated = self
            .conn
            .execute(
                "UPDATE log_entries SET actor_id = ?2 WHERE actor_id = ?1",
                params![from.get(), to.get()],
            )
            .map_err(from_rusqlite)?;
        Ok(updated)
    }

    fn clear_actor(&mut self, actor: ActorId) -> AuditResult<usize> {
        let updated = self
            .conn
            .execute(
                "UPDATE log_entries SET actor_id = NULL WHERE actor_id = ?1",
                [actor.get()],
            )
            .map_err(from_rusqlite)?;
        Ok(updated)
    }

    fn delete_for_entity_type(&mut self, entity_type: &str) -> AuditResult<usize> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM log_entries WHERE target_type = ?1 OR anchor_type = ?1",
                [entity_type],
            )
            .map_err(from_rusqlite)?;
        Ok(deleted)
    }
}

fn encode_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn encode_changes(entry: &LogEntry) -> Result<String> {
    entry
        .changes_json()
        .map_err(|e| corrupt_row(entry.id.unwrap_or_default(), &e.to_string()))
}

/// Columns of one `log_entries` row before decoding
struct RawEntry {
    id: i64,
    target_type: String,
    target_id: i64,
    anchor_type: String,
    anchor_id: i64,
    created_at: String,
    actor_id: Option<i64>,
    action: String,
    request_id: String,
    changes: String,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            target_type: row.get(1)?,
            target_id: row.get(2)?,
            anchor_type: row.get(3)?,
            anchor_id: row.get(4)?,
            created_at: row.get(5)?,
            actor_id: row.get(6)?,
            action: row.get(7)?,
            request_id: row.get(8)?,
            changes: row.get(9)?,
        })
    }

    fn into_entry(self) -> Result<LogEntry> {
        let id = self.id;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| corrupt_row(id, &format!("created_at: {}", e)))?
            .with_timezone(&Utc);
        let action: ActionKind = self
            .action
            .parse()
            .map_err(|e: audex_core::AuditError| corrupt_row(id, &e.to_string()))?;
        let changes = LogEntry::changes_from_json(&self.changes)
            .map_err(|e| corrupt_row(id, &e.to_string()))?;

        Ok(LogEntry {
            id: Some(id),
            target: EntityRef::new(self.target_type, self.target_id),
            anchor: EntityRef::new(self.anchor_type, self.anchor_id),
            created_at,
            actor: self.actor_id.map(ActorId::new),
            action,
            request_id: self.request_id,
            changes,
        })
    }
}
