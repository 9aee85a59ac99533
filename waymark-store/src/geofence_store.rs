//! Locally cached geofence definitions.
//!
//! The cache is refreshed wholesale: a successful fetch replaces the
//! entire set in one transaction, a failed fetch leaves the previous set
//! untouched (the caller simply never calls [`GeofenceStore::replace_all`]).
//! Definitions are never evicted for drifting out of the download radius;
//! eviction only happens through the next full replacement.

use crate::error::{StorageError, StorageResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;
use waymark_types::{Geofence, Timestamp};

/// Persistent geofence cache backed by SQLite.
pub struct GeofenceStore {
    conn: Arc<Mutex<Connection>>,
}

impl GeofenceStore {
    /// Opens (or creates) a geofence store at the given path.
    pub fn new(path: &str) -> StorageResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StorageError::Open(format!("failed to open geofence store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        store.recover_corrupt_rows()?;
        Ok(store)
    }

    /// Opens an in-memory geofence store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StorageError::Open(format!("failed to open in-memory geofence store: {e}"))
        })?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS geofences (
                id TEXT PRIMARY KEY,
                body TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cache_meta (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            ",
        )
        .map_err(|e| StorageError::Open(format!("failed to init geofence schema: {e}")))?;
        Ok(())
    }

    /// Resets the cache if any persisted row no longer deserializes.
    /// A lost cache is refetched on the next refresh; startup must not fail.
    fn recover_corrupt_rows(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT body FROM geofences")
            .map_err(|e| StorageError::Query(format!("failed to scan geofence rows: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| StorageError::Query(format!("failed to scan geofence rows: {e}")))?;

        let mut corrupt = 0usize;
        for row in rows {
            match row {
                Ok(body) if serde_json::from_str::<Geofence>(&body).is_ok() => {}
                _ => corrupt += 1,
            }
        }
        drop(stmt);

        if corrupt > 0 {
            warn!("geofence cache holds {corrupt} undeserializable rows, resetting cache");
            conn.execute("DELETE FROM geofences", [])
                .map_err(|e| StorageError::Query(format!("failed to reset geofence cache: {e}")))?;
            conn.execute("DELETE FROM cache_meta", [])
                .map_err(|e| StorageError::Query(format!("failed to reset cache meta: {e}")))?;
        }
        Ok(())
    }

    /// Atomically replaces the entire cached set and records the refresh
    /// time. No partial merge: stale leftovers cannot survive a refresh.
    pub fn replace_all(
        &self,
        geofences: &[Geofence],
        refreshed_at: Timestamp,
    ) -> StorageResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| StorageError::Query(format!("failed to begin replacement: {e}")))?;
        tx.execute("DELETE FROM geofences", [])
            .map_err(|e| StorageError::Query(format!("failed to clear geofences: {e}")))?;
        for geofence in geofences {
            let body = serde_json::to_string(geofence)?;
            tx.execute(
                "INSERT INTO geofences (id, body) VALUES (?1, ?2)",
                params![geofence.id.to_string(), body],
            )
            .map_err(|e| StorageError::Query(format!("failed to insert geofence: {e}")))?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO cache_meta (key, value) VALUES ('last_refreshed', ?1)",
            params![refreshed_at.as_millis() as i64],
        )
        .map_err(|e| StorageError::Query(format!("failed to record refresh time: {e}")))?;
        tx.commit()
            .map_err(|e| StorageError::Query(format!("failed to commit replacement: {e}")))?;
        Ok(())
    }

    /// Returns the full cached set.
    pub fn all(&self) -> StorageResult<Vec<Geofence>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT body FROM geofences")
            .map_err(|e| StorageError::Query(format!("failed to prepare geofence query: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| StorageError::Query(format!("failed to query geofences: {e}")))?;

        let mut geofences = Vec::new();
        for row in rows {
            let body = row
                .map_err(|e| StorageError::Query(format!("failed to read geofence row: {e}")))?;
            geofences.push(serde_json::from_str(&body)?);
        }
        Ok(geofences)
    }

    /// Number of cached definitions.
    pub fn count(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM geofences", [], |row| row.get(0))
            .map_err(|e| StorageError::Query(format!("failed to count geofences: {e}")))?;
        Ok(count as usize)
    }

    /// When the cache was last successfully refreshed, if ever.
    pub fn last_refreshed(&self) -> StorageResult<Option<Timestamp>> {
        let conn = self.conn.lock().unwrap();
        match conn.query_row(
            "SELECT value FROM cache_meta WHERE key = 'last_refreshed'",
            [],
            |row| row.get::<_, i64>(0),
        ) {
            Ok(millis) => Ok(Some(Timestamp::from_millis(millis as u64))),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Query(format!(
                "failed to read refresh time: {e}"
            ))),
        }
    }

    /// True once the cache age exceeds `ttl`, or if it was never refreshed.
    pub fn is_stale(&self, ttl: Duration, now: Timestamp) -> StorageResult<bool> {
        match self.last_refreshed()? {
            Some(refreshed) => Ok(now.saturating_elapsed_since(refreshed) > ttl),
            None => Ok(true),
        }
    }
}
