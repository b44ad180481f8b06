use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{AtelierError, Result};
use crate::model::Session;
use crate::storage::{SessionListing, SessionStore};

/// SQLite-backed session store.
///
/// The session aggregate is stored as a JSON document beside a few indexed
/// scalar columns used for listing and ownership checks. Uses a single
/// `Connection` behind `Arc<Mutex<>>` so it can be shared across async
/// tasks; all blocking SQLite calls go through [`with_conn`](Self::with_conn)
/// which runs them on the Tokio blocking thread-pool.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) a file-backed database at `path`. Sets WAL journal
    /// mode, then creates the schema if it doesn't already exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|e| AtelierError::Storage(format!("failed to open SQLite database: {e}")))?;

        Self::configure_and_init(conn, path)
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            AtelierError::Storage(format!("failed to open in-memory SQLite database: {e}"))
        })?;

        Self::configure_and_init(conn, PathBuf::from(":memory:"))
    }

    /// Return the path this database was opened with (`:memory:` for in-memory).
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── helpers ────────────────────────────────────────────────────────

    fn configure_and_init(conn: Connection, path: PathBuf) -> Result<Self> {
        // WAL mode for better concurrent-read performance.
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| AtelierError::Storage(format!("failed to set WAL mode: {e}")))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };

        store.create_tables()?;
        Ok(store)
    }

    /// Create the schema (idempotent).
    fn create_tables(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| AtelierError::Storage(format!("failed to acquire database lock: {e}")))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                last_accessed TEXT NOT NULL,
                created_at TEXT NOT NULL,
                document TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owner_id, is_active);
            CREATE INDEX IF NOT EXISTS idx_sessions_last_accessed ON sessions(owner_id, last_accessed DESC);
            ",
        )
        .map_err(|e| AtelierError::Storage(format!("failed to create tables: {e}")))?;

        Ok(())
    }

    /// Run a blocking closure against the SQLite connection on the Tokio
    /// blocking thread-pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                AtelierError::Storage(format!("failed to acquire database lock: {e}"))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| AtelierError::Storage(format!("task join error: {e}")))?
    }
}

impl SessionStore for SqliteStore {
    async fn save_session(&self, session: &Session) -> Result<()> {
        let document = serde_json::to_string(session)?;
        let id = session.id.to_string();
        let owner_id = session.owner_id.clone();
        let is_active = session.is_active;
        let last_accessed = session.last_accessed.to_rfc3339();
        let created_at = session.created_at.to_rfc3339();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, owner_id, is_active, last_accessed, created_at, document)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     is_active = excluded.is_active,
                     last_accessed = excluded.last_accessed,
                     document = excluded.document",
                params![id, owner_id, is_active, last_accessed, created_at, document],
            )
            .map_err(|e| AtelierError::Storage(format!("failed to save session: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn get_session(&self, id: Uuid, owner_id: &str) -> Result<Session> {
        let id_str = id.to_string();
        let owner = owner_id.to_string();

        self.with_conn(move |conn| {
            let document: Option<String> = conn
                .query_row(
                    "SELECT document FROM sessions WHERE id = ?1 AND owner_id = ?2",
                    params![id_str, owner],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| AtelierError::Storage(format!("failed to load session: {e}")))?;

            let document =
                document.ok_or_else(|| AtelierError::NotFound(format!("session {id_str}")))?;
            Ok(serde_json::from_str(&document)?)
        })
        .await
    }

    async fn list_sessions(&self, owner_id: &str, limit: usize) -> Result<Vec<SessionListing>> {
        let owner = owner_id.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT document FROM sessions
                     WHERE owner_id = ?1 AND is_active = 1
                     ORDER BY last_accessed DESC
                     LIMIT ?2",
                )
                .map_err(|e| AtelierError::Storage(format!("failed to prepare listing: {e}")))?;

            let rows = stmt
                .query_map(params![owner, limit as i64], |row| {
                    row.get::<_, String>(0)
                })
                .map_err(|e| AtelierError::Storage(format!("failed to list sessions: {e}")))?;

            let mut listings = Vec::new();
            for document in rows {
                let document = document
                    .map_err(|e| AtelierError::Storage(format!("failed to read row: {e}")))?;
                let session: Session = serde_json::from_str(&document)?;
                listings.push(SessionListing::from(&session));
            }
            Ok(listings)
        })
        .await
    }

    async fn delete_session(&self, id: Uuid, owner_id: &str) -> Result<()> {
        let id_str = id.to_string();
        let owner = owner_id.to_string();

        self.with_conn(move |conn| {
            let affected = conn
                .execute(
                    "DELETE FROM sessions WHERE id = ?1 AND owner_id = ?2",
                    params![id_str, owner],
                )
                .map_err(|e| AtelierError::Storage(format!("failed to delete session: {e}")))?;

            if affected == 0 {
                return Err(AtelierError::NotFound(format!("session {id_str}")));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionSettings;

    fn new_session(owner: &str, name: &str) -> Session {
        Session::new(owner.into(), name.into(), SessionSettings::default())
    }

    #[test]
    fn open_in_memory_creates_tables() {
        let store = SqliteStore::open_in_memory().expect("should open in-memory DB");
        assert_eq!(store.path().to_str().unwrap(), ":memory:");

        let conn = store.conn.lock().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"sessions".to_string()));
    }

    #[test]
    fn create_tables_is_idempotent() {
        let store = SqliteStore::open_in_memory().expect("should open in-memory DB");
        store.create_tables().expect("idempotent create_tables");
    }

    #[tokio::test]
    async fn save_and_get_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut session = new_session("alice", "buttons");
        session.record_message(crate::model::ChatMessage::user("make a button"));
        store.save_session(&session).await.unwrap();

        let loaded = store.get_session(session.id, "alice").await.unwrap();
        assert_eq!(loaded.name, "buttons");
        assert_eq!(loaded.chat_history.len(), 1);
        assert_eq!(loaded.metadata.total_messages, 1);
    }

    #[tokio::test]
    async fn get_is_owner_scoped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = new_session("alice", "private");
        store.save_session(&session).await.unwrap();

        let err = store.get_session(session.id, "mallory").await.unwrap_err();
        assert!(matches!(err, AtelierError::NotFound(_)));
    }

    #[tokio::test]
    async fn save_replaces_existing_document() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut session = new_session("alice", "evolving");
        store.save_session(&session).await.unwrap();

        session.record_message(crate::model::ChatMessage::user("hello"));
        store.save_session(&session).await.unwrap();

        let loaded = store.get_session(session.id, "alice").await.unwrap();
        assert_eq!(loaded.chat_history.len(), 1);
    }

    #[tokio::test]
    async fn listing_hides_soft_deleted_and_other_owners() {
        let store = SqliteStore::open_in_memory().unwrap();

        let active = new_session("alice", "active");
        store.save_session(&active).await.unwrap();

        let mut deleted = new_session("alice", "deleted");
        deleted.soft_delete();
        store.save_session(&deleted).await.unwrap();

        let other = new_session("bob", "bobs");
        store.save_session(&other).await.unwrap();

        let listings = store.list_sessions("alice", 50).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].name, "active");

        // Soft-deleted session is still retrievable directly.
        let loaded = store.get_session(deleted.id, "alice").await.unwrap();
        assert!(!loaded.is_active);
    }

    #[tokio::test]
    async fn listing_orders_by_last_accessed() {
        let store = SqliteStore::open_in_memory().unwrap();

        let mut older = new_session("alice", "older");
        older.last_accessed = chrono::Utc::now() - chrono::Duration::hours(2);
        store.save_session(&older).await.unwrap();

        let newer = new_session("alice", "newer");
        store.save_session(&newer).await.unwrap();

        let listings = store.list_sessions("alice", 50).await.unwrap();
        assert_eq!(listings[0].name, "newer");
        assert_eq!(listings[1].name, "older");
    }

    #[tokio::test]
    async fn delete_session_is_owner_scoped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = new_session("alice", "doomed");
        store.save_session(&session).await.unwrap();

        let err = store
            .delete_session(session.id, "mallory")
            .await
            .unwrap_err();
        assert!(matches!(err, AtelierError::NotFound(_)));

        store.delete_session(session.id, "alice").await.unwrap();
        let err = store.get_session(session.id, "alice").await.unwrap_err();
        assert!(matches!(err, AtelierError::NotFound(_)));
    }
}
