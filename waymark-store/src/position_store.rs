//! Last-known position, one durable row.

use crate::error::{StorageError, StorageResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::warn;
use waymark_types::Position;

/// Persistent single-slot store for the last resolved position.
pub struct PositionStore {
    conn: Arc<Mutex<Connection>>,
}

impl PositionStore {
    /// Opens (or creates) a position store at the given path.
    pub fn new(path: &str) -> StorageResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StorageError::Open(format!("failed to open position store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        store.recover_corrupt_rows()?;
        Ok(store)
    }

    /// Opens an in-memory position store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StorageError::Open(format!("failed to open in-memory position store: {e}"))
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
            CREATE TABLE IF NOT EXISTS last_position (
                slot INTEGER PRIMARY KEY CHECK (slot = 0),
                body TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| StorageError::Open(format!("failed to init position schema: {e}")))?;
        Ok(())
    }

    fn recover_corrupt_rows(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let body = conn.query_row("SELECT body FROM last_position WHERE slot = 0", [], |row| {
            row.get::<_, String>(0)
        });
        match body {
            Ok(body) if serde_json::from_str::<Position>(&body).is_err() => {
                warn!("last-known position no longer deserializes, clearing it");
                conn.execute("DELETE FROM last_position", []).map_err(|e| {
                    StorageError::Query(format!("failed to clear position store: {e}"))
                })?;
                Ok(())
            }
            Ok(_) | Err(rusqlite::Error::QueryReturnedNoRows) => Ok(()),
            Err(e) => Err(StorageError::Query(format!(
                "failed to scan position row: {e}"
            ))),
        }
    }

    /// Overwrites the last-known position.
    pub fn save(&self, position: &Position) -> StorageResult<()> {
        let body = serde_json::to_string(position)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO last_position (slot, body) VALUES (0, ?1)",
            params![body],
        )
        .map_err(|e| StorageError::Query(format!("failed to save position: {e}")))?;
        Ok(())
    }

    /// Returns the last-known position, if one was ever saved.
    pub fn load(&self) -> StorageResult<Option<Position>> {
        let conn = self.conn.lock().unwrap();
        match conn.query_row("SELECT body FROM last_position WHERE slot = 0", [], |row| {
            row.get::<_, String>(0)
        }) {
            Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("failed to load position: {e}"))),
        }
    }
}
