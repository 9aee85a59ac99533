//! Durable outbox of geofence events pending delivery.
//!
//! Events are appended by the evaluator and drained by the sync manager.
//! The queue lives in its own SQLite file so events enqueued while
//! offline survive process restarts. Rows are immutable except for the
//! `synced` flag; acknowledged rows are purged after each drain cycle.

use crate::error::{StorageError, StorageResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::warn;
use waymark_types::{EventId, GeofenceEvent};

/// Persistent event outbox backed by SQLite.
pub struct EventQueue {
    conn: Arc<Mutex<Connection>>,
}

impl EventQueue {
    /// Opens (or creates) an event queue at the given path.
    pub fn new(path: &str) -> StorageResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StorageError::Open(format!("failed to open event queue: {e}")))?;
        let queue = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        queue.init_schema()?;
        queue.recover_corrupt_rows()?;
        Ok(queue)
    }

    /// Opens an in-memory event queue (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Open(format!("failed to open in-memory event queue: {e}")))?;
        let queue = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        queue.init_schema()?;
        Ok(queue)
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                geofence_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0,
                body TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_pending
                ON events (synced, timestamp_ms);
            ",
        )
        .map_err(|e| StorageError::Open(format!("failed to init event queue schema: {e}")))?;
        Ok(())
    }

    /// Resets the queue if any persisted row no longer deserializes.
    /// Losing the outbox is accepted here as a last resort against an
    /// unreadable local store; startup must not fail.
    fn recover_corrupt_rows(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT body FROM events")
            .map_err(|e| StorageError::Query(format!("failed to scan event rows: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| StorageError::Query(format!("failed to scan event rows: {e}")))?;

        let mut corrupt = 0usize;
        for row in rows {
            match row {
                Ok(body) if serde_json::from_str::<GeofenceEvent>(&body).is_ok() => {}
                _ => corrupt += 1,
            }
        }
        drop(stmt);

        if corrupt > 0 {
            warn!("event queue holds {corrupt} undeserializable rows, resetting outbox");
            conn.execute("DELETE FROM events", [])
                .map_err(|e| StorageError::Query(format!("failed to reset event queue: {e}")))?;
        }
        Ok(())
    }

    /// Appends an event with `synced = 0`. Re-enqueueing the same local
    /// id is a no-op, so replays are harmless.
    pub fn enqueue(&self, event: &GeofenceEvent) -> StorageResult<()> {
        let body = serde_json::to_string(event)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO events (id, geofence_id, event_type, timestamp_ms, synced, body)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                event.id.to_string(),
                event.geofence_id.to_string(),
                event.event_type.as_str(),
                event.timestamp.as_millis() as i64,
                body,
            ],
        )
        .map_err(|e| StorageError::Query(format!("failed to enqueue event: {e}")))?;
        Ok(())
    }

    /// Returns all unsynced events, oldest first. Event ids break ties
    /// within the same millisecond (v7 ids carry creation order).
    pub fn list_pending(&self) -> StorageResult<Vec<GeofenceEvent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT body FROM events WHERE synced = 0 ORDER BY timestamp_ms ASC, id ASC",
            )
            .map_err(|e| StorageError::Query(format!("failed to prepare pending query: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| StorageError::Query(format!("failed to query pending events: {e}")))?;

        let mut events = Vec::new();
        for row in rows {
            let body =
                row.map_err(|e| StorageError::Query(format!("failed to read event row: {e}")))?;
            events.push(serde_json::from_str(&body)?);
        }
        Ok(events)
    }

    /// Flips the synced flag for the given event ids.
    pub fn mark_synced(&self, ids: &[EventId]) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        for id in ids {
            conn.execute(
                "UPDATE events SET synced = 1 WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(|e| StorageError::Query(format!("failed to mark event synced: {e}")))?;
        }
        Ok(())
    }

    /// Removes acknowledged events from durable storage.
    /// Returns the number of rows purged.
    pub fn purge_synced(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let purged = conn
            .execute("DELETE FROM events WHERE synced = 1", [])
            .map_err(|e| StorageError::Query(format!("failed to purge synced events: {e}")))?;
        Ok(purged)
    }

    /// Number of events still awaiting delivery.
    pub fn pending_count(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM events WHERE synced = 0", [], |row| {
                row.get(0)
            })
            .map_err(|e| StorageError::Query(format!("failed to count pending events: {e}")))?;
        Ok(count as usize)
    }

    /// Total number of rows, synced or not.
    pub fn total_count(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .map_err(|e| StorageError::Query(format!("failed to count events: {e}")))?;
        Ok(count as usize)
    }
}
