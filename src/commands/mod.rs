/*!
Command handlers for the CLI

This module provides the handlers invoked by the CLI entrypoint:

- `chat`     - One-shot or interactive streaming chat
- `sessions` - Local and remote session management
- `replay`   - Offline replay of a captured event stream

The handlers stay small and drive the library components: the transport,
the session store and the turn controller.
*/

use crate::config::StorageConfig;
use crate::error::Result;
use crate::storage::SqliteSessionStore;

pub mod chat;
pub mod render;
pub mod replay;
pub mod sessions;
pub mod special_commands;

/// Open the session store named by the storage configuration
///
/// Uses the configured database path when set, otherwise the platform data
/// directory.
///
/// # Errors
///
/// Returns error if the database cannot be opened or initialized
pub fn open_store(storage: &StorageConfig) -> Result<SqliteSessionStore> {
    match &storage.db_path {
        Some(path) => {
            tracing::debug!("Using session database {}", path.display());
            SqliteSessionStore::new_with_path(path.clone())
        }
        None => SqliteSessionStore::new(),
    }
}
