//! In-memory session directory

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SessionRecord, SessionStore};
use crate::error::{ChatStreamError, Result};

/// [`SessionStore`] kept in process memory
///
/// Used by `replay` and by tests; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<Vec<SessionRecord>>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        Ok(self.sessions.read().await.clone())
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        Ok(self
            .sessions
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    async fn get_or_create(&self, id: &str, title: &str) -> Result<(SessionRecord, bool)> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.iter().find(|record| record.id == id) {
            return Ok((existing.clone(), false));
        }

        let record = SessionRecord::new(id, title);
        sessions.push(record.clone());
        Ok((record, true))
    }

    async fn rename(&self, id: &str, title: &str) -> Result<SessionRecord> {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| ChatStreamError::SessionNotFound(id.to_string()))?;
        record.title = title.to_string();
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_or_create_returns_existing() {
        let store = MemorySessionStore::new();
        let (first, created) = store.get_or_create("s1", "One").await.unwrap();
        assert!(created);
        let (second, created) = store.get_or_create("s1", "Two").await.unwrap();
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(second.title, "One");
    }

    #[tokio::test]
    async fn test_list_preserves_creation_order() {
        let store = MemorySessionStore::new();
        for id in ["c", "a", "b"] {
            store.get_or_create(id, id).await.unwrap();
        }
        store.rename("a", "renamed").await.unwrap();
        let ids: Vec<String> = store
            .list_sessions()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_rename_missing_session_fails() {
        let store = MemorySessionStore::new();
        let err = store.rename("nope", "x").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatStreamError>(),
            Some(ChatStreamError::SessionNotFound(id)) if id == "nope"
        ));
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_creates_once() {
        let store = Arc::new(MemorySessionStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .get_or_create("shared", &format!("title {}", i))
                    .await
                    .unwrap()
                    .1
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.list_sessions().await.unwrap().len(), 1);
    }
}
