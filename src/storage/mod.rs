use crate::error::{ChatStreamError, Result};
use crate::session::{SessionRecord, SessionStore};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

/// SQLite-backed session directory used by the binary
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    db_path: PathBuf,
}

impl SqliteSessionStore {
    /// Create a new store
    ///
    /// Initializes the database file in the user's data directory.
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "chatstream", "chatstream").ok_or_else(|| {
            ChatStreamError::Storage("Could not determine data directory".into())
        })?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| ChatStreamError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("sessions.db"))
    }

    /// Create a new store that uses the specified database path.
    ///
    /// This is primarily useful for tests where the default application data
    /// directory is not desirable (for example, using a temporary directory).
    ///
    /// # Examples
    ///
    /// ```
    /// use chatstream::storage::SqliteSessionStore;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = SqliteSessionStore::new_with_path(dir.path().join("sessions.db")).unwrap();
    /// assert!(store.db_path().exists());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| ChatStreamError::Storage(e.to_string()))?;
        }

        let store = Self { db_path };
        store.init()?;
        Ok(store)
    }

    /// Location of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| ChatStreamError::Storage(e.to_string()).into())
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(|e| ChatStreamError::Storage(e.to_string()))?;

        Ok(())
    }

    fn select_session(conn: &Connection, id: &str) -> Result<Option<SessionRecord>> {
        conn.query_row(
            "SELECT id, title, created_at FROM sessions WHERE id = ?",
            params![id],
            record_from_row,
        )
        .optional()
        .context("Failed to query session")
        .map_err(|e| ChatStreamError::Storage(e.to_string()).into())
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let id: String = row.get(0)?;
    let title: String = row.get(1)?;
    let created_at_str: String = row.get(2)?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(SessionRecord {
        id,
        title,
        created_at,
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let conn = self.open()?;

        let mut stmt = conn
            .prepare("SELECT id, title, created_at FROM sessions ORDER BY created_at ASC, rowid ASC")
            .context("Failed to prepare statement")
            .map_err(|e| ChatStreamError::Storage(e.to_string()))?;

        let sessions = stmt
            .query_map([], record_from_row)
            .context("Failed to query sessions")
            .map_err(|e| ChatStreamError::Storage(e.to_string()))?
            .flatten()
            .collect();

        Ok(sessions)
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.open()?;
        Self::select_session(&conn, id)
    }

    async fn get_or_create(&self, id: &str, title: &str) -> Result<(SessionRecord, bool)> {
        let mut conn = self.open()?;
        let now = Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| ChatStreamError::Storage(e.to_string()))?;

        // The primary key makes the insert a no-op for a known id.
        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO sessions (id, title, created_at, updated_at)
                VALUES (?, ?, ?, ?)",
                params![id, title, now, now],
            )
            .context("Failed to insert session")
            .map_err(|e| ChatStreamError::Storage(e.to_string()))?;

        let record = Self::select_session(&tx, id)?.ok_or_else(|| {
            ChatStreamError::Storage(format!("Session {} vanished after insert", id))
        })?;

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| ChatStreamError::Storage(e.to_string()))?;

        Ok((record, inserted == 1))
    }

    async fn rename(&self, id: &str, title: &str) -> Result<SessionRecord> {
        let conn = self.open()?;
        let now = Utc::now().to_rfc3339();

        let updated = conn
            .execute(
                "UPDATE sessions SET title = ?, updated_at = ? WHERE id = ?",
                params![title, now, id],
            )
            .context("Failed to update session")
            .map_err(|e| ChatStreamError::Storage(e.to_string()))?;

        if updated == 0 {
            return Err(ChatStreamError::SessionNotFound(id.to_string()).into());
        }

        Self::select_session(&conn, id)?
            .ok_or_else(|| ChatStreamError::SessionNotFound(id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Helper: create a temporary store backed by a temp directory.
    ///
    /// Returns both the store and the `TempDir` so the caller keeps
    /// ownership of the directory (preventing it from being removed).
    fn create_test_store() -> (SqliteSessionStore, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let db_path = dir.path().join("sessions.db");
        let store = SqliteSessionStore::new_with_path(db_path).expect("failed to create store");
        (store, dir)
    }

    #[test]
    fn test_init_creates_table() {
        let (store, _dir) = create_test_store();
        let conn = Connection::open(store.db_path()).expect("open connection");
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='sessions'",
                [],
                |r| r.get(0),
            )
            .expect("query row");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_new_with_path_creates_parent_directory() {
        let dir = tempdir().expect("failed to create tempdir");
        let db_path = dir.path().join("nested").join("sessions.db");
        let store = SqliteSessionStore::new_with_path(&db_path).expect("new_with_path failed");
        assert_eq!(store.db_path(), db_path.as_path());
        assert!(db_path.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_get_or_create_inserts_once() {
        let (store, _dir) = create_test_store();

        let (first, created) = store.get_or_create("s1", "First").await.unwrap();
        assert!(created);
        assert_eq!(first.title, "First");

        let (second, created) = store.get_or_create("s1", "Second").await.unwrap();
        assert!(!created);
        assert_eq!(second.title, "First");
        assert_eq!(first.created_at, second.created_at);

        assert_eq!(store.list_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rename_updates_title_only() {
        let (store, _dir) = create_test_store();
        let (original, _) = store.get_or_create("s1", "Old").await.unwrap();

        let renamed = store.rename("s1", "New").await.unwrap();
        assert_eq!(renamed.title, "New");
        assert_eq!(renamed.created_at, original.created_at);
    }

    #[tokio::test]
    async fn test_rename_missing_session_is_not_found() {
        let (store, _dir) = create_test_store();
        let err = store.rename("missing", "x").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatStreamError>(),
            Some(ChatStreamError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_session_returns_none_for_missing_id() {
        let (store, _dir) = create_test_store();
        assert!(store.get_session("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sessions_in_creation_order() {
        let (store, _dir) = create_test_store();
        for id in ["b", "a", "c"] {
            store.get_or_create(id, id).await.unwrap();
        }
        store.rename("a", "renamed").await.unwrap();

        let ids: Vec<String> = store
            .list_sessions()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_list_sessions_returns_empty_for_new_db() {
        let (store, _dir) = create_test_store();
        assert!(store.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let (store, dir) = create_test_store();
        store.get_or_create("s1", "Kept").await.unwrap();
        drop(store);

        let reopened = SqliteSessionStore::new_with_path(dir.path().join("sessions.db")).unwrap();
        let record = reopened.get_session("s1").await.unwrap().unwrap();
        assert_eq!(record.title, "Kept");
    }
}
