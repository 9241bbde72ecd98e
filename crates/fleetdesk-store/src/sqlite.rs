//! SQLite-based store implementation

use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::{PersistedState, Store, StoreResult};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            -- State snapshot (single row)
            CREATE TABLE IF NOT EXISTS snapshot (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                snapshot_json TEXT NOT NULL
            );
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn load_snapshot(&self) -> StoreResult<Option<PersistedState>> {
        let conn = self.conn.lock().unwrap();

        let json: Option<String> = conn
            .query_row("SELECT snapshot_json FROM snapshot WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match json {
            Some(s) => {
                let snapshot: PersistedState = serde_json::from_str(&s)?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    fn save_snapshot(&self, snapshot: &PersistedState) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let json = serde_json::to_string(snapshot)?;

        conn.execute(
            r#"
            INSERT INTO snapshot (id, snapshot_json)
            VALUES (1, ?)
            ON CONFLICT(id)
            DO UPDATE SET snapshot_json = excluded.snapshot_json
            "#,
            [json],
        )?;

        debug!("Snapshot saved");
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetdesk_api::{OperationKind, UserIdentity};

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let store = SqliteStore::in_memory().unwrap();

        // No snapshot initially
        assert!(store.load_snapshot().unwrap().is_none());

        let snapshot = PersistedState {
            user: Some(UserIdentity {
                id: "user-1".into(),
                email: "tech@depot.example".into(),
            }),
            cache_hits: 12,
            cache_misses: 3,
            pending_operations: vec![fleetdesk_api::OfflineOperation::new(
                OperationKind::SignOut,
                3,
                fleetdesk_util::now(),
            )],
            saved_at: Some(fleetdesk_util::now()),
            ..Default::default()
        };
        store.save_snapshot(&snapshot).unwrap();

        let loaded = store.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded.cache_hits, 12);
        assert_eq!(loaded.cache_misses, 3);
        assert_eq!(loaded.pending_operations.len(), 1);
        assert_eq!(
            loaded.user.unwrap().email,
            "tech@depot.example".to_string()
        );
    }

    #[test]
    fn test_snapshot_overwrite() {
        let store = SqliteStore::in_memory().unwrap();

        store.save_snapshot(&PersistedState::default()).unwrap();

        let second = PersistedState {
            cache_hits: 5,
            ..Default::default()
        };
        store.save_snapshot(&second).unwrap();

        // Single-row table: the second save replaces the first
        let loaded = store.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded.cache_hits, 5);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleetdesk.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            let snapshot = PersistedState {
                cache_hits: 7,
                ..Default::default()
            };
            store.save_snapshot(&snapshot).unwrap();
        }

        // Reopen and read back
        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded.cache_hits, 7);
    }
}
