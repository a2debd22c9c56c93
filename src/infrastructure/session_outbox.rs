use crate::domain::models::SessionDraft;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    pub id: i64,
    pub draft: SessionDraft,
    pub enqueued_at: DateTime<Utc>,
}

/// Holds focus sessions whose save to the server failed. Entries are only
/// retried through the explicit flush command, never in the background.
pub trait SessionOutbox: Send + Sync {
    fn enqueue(&self, draft: &SessionDraft, enqueued_at: DateTime<Utc>) -> Result<(), InfraError>;
    fn list(&self) -> Result<Vec<OutboxEntry>, InfraError>;
    fn remove(&self, entry_id: i64) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSessionOutbox {
    db_path: PathBuf,
}

impl SqliteSessionOutbox {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

struct OutboxRow {
    id: i64,
    description: Option<String>,
    tag: Option<String>,
    started_at: String,
    completed_at: String,
    duration_minutes: i64,
    enqueued_at: String,
}

fn outbox_row(row: &Row<'_>) -> rusqlite::Result<OutboxRow> {
    Ok(OutboxRow {
        id: row.get(0)?,
        description: row.get(1)?,
        tag: row.get(2)?,
        started_at: row.get(3)?,
        completed_at: row.get(4)?,
        duration_minutes: row.get(5)?,
        enqueued_at: row.get(6)?,
    })
}

fn parse_rfc3339_column(value: &str, column: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::InvalidConfig(format!("invalid {column} '{value}' in outbox: {error}"))
        })
}

impl SessionOutbox for SqliteSessionOutbox {
    fn enqueue(&self, draft: &SessionDraft, enqueued_at: DateTime<Utc>) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO session_outbox
               (description, tag, started_at, completed_at, duration_minutes, enqueued_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                draft.description,
                draft.tag,
                draft.started_at.to_rfc3339(),
                draft.completed_at.to_rfc3339(),
                draft.duration_minutes,
                enqueued_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<OutboxEntry>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, description, tag, started_at, completed_at, duration_minutes, enqueued_at
             FROM session_outbox ORDER BY id ASC",
        )?;
        let rows = statement.query_map([], outbox_row)?;

        let mut entries = Vec::new();
        for row in rows {
            let row = row?;
            entries.push(OutboxEntry {
                id: row.id,
                draft: SessionDraft {
                    description: row.description,
                    tag: row.tag,
                    started_at: parse_rfc3339_column(&row.started_at, "started_at")?,
                    completed_at: parse_rfc3339_column(&row.completed_at, "completed_at")?,
                    duration_minutes: row.duration_minutes.max(0) as u32,
                },
                enqueued_at: parse_rfc3339_column(&row.enqueued_at, "enqueued_at")?,
            });
        }
        Ok(entries)
    }

    fn remove(&self, entry_id: i64) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "DELETE FROM session_outbox WHERE id = ?1",
            params![entry_id],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionOutbox {
    entries: Mutex<Vec<OutboxEntry>>,
    next_id: Mutex<i64>,
}

impl SessionOutbox for InMemorySessionOutbox {
    fn enqueue(&self, draft: &SessionDraft, enqueued_at: DateTime<Utc>) -> Result<(), InfraError> {
        let mut next_id = self
            .next_id
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("outbox lock poisoned: {error}")))?;
        *next_id += 1;
        let entry = OutboxEntry {
            id: *next_id,
            draft: draft.clone(),
            enqueued_at,
        };

        let mut entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("outbox lock poisoned: {error}")))?;
        entries.push(entry);
        Ok(())
    }

    fn list(&self) -> Result<Vec<OutboxEntry>, InfraError> {
        let entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("outbox lock poisoned: {error}")))?;
        Ok(entries.clone())
    }

    fn remove(&self, entry_id: i64) -> Result<(), InfraError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("outbox lock poisoned: {error}")))?;
        entries.retain(|entry| entry.id != entry_id);
        Ok(())
    }
}
