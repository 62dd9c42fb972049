/// Disk persistence for history snapshots, backed by redb.
///
/// A single database file holds one table mapping session ID to the
/// JSON-encoded snapshot for that session. The snapshot is overwritten
/// wholesale on every history mutation, so a crash can lose at most
/// the mutation in flight.
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::action::HistorySnapshot;

/// Sessions table: session ID → JSON-serialized `HistorySnapshot`.
const SESSION_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Snapshot store for history documents.
///
/// Shared across sessions via `Arc<PersistenceLayer>`; redb serializes
/// writers internally.
pub struct PersistenceLayer {
    db: Database,
}

impl std::fmt::Debug for PersistenceLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceLayer").finish()
    }
}

impl PersistenceLayer {
    /// Opens or creates the history database in the given directory.
    ///
    /// Creates the directory and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the
    /// database cannot be opened.
    pub fn open(data_dir: &Path) -> Result<Arc<Self>> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("history.redb");
        let db = Database::create(&db_path)
            .with_context(|| format!("Failed to open history database: {}", db_path.display()))?;

        // Ensure the table exists
        let write_txn = db
            .begin_write()
            .context("Failed to begin initial write transaction")?;
        {
            let _ = write_txn
                .open_table(SESSION_TABLE)
                .context("Failed to create sessions table")?;
        }
        write_txn
            .commit()
            .context("Failed to commit initial transaction")?;

        Ok(Arc::new(Self { db }))
    }

    /// Writes a session's snapshot, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write transaction fails.
    pub fn write_snapshot(&self, session_id: &str, snapshot: &HistorySnapshot) -> Result<()> {
        let bytes = serde_json::to_vec(snapshot).context("Failed to serialize history snapshot")?;

        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(SESSION_TABLE)
                .context("Failed to open sessions table")?;
            table
                .insert(session_id, bytes.as_slice())
                .context("Failed to insert snapshot")?;
        }
        write_txn
            .commit()
            .context("Failed to commit write transaction")?;
        Ok(())
    }

    /// Reads a session's snapshot, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction fails or the stored
    /// bytes are not a well-formed snapshot document.
    pub fn read_snapshot(&self, session_id: &str) -> Result<Option<HistorySnapshot>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(SESSION_TABLE)
            .context("Failed to open sessions table")?;

        match table.get(session_id).context("Failed to read snapshot")? {
            Some(guard) => {
                let snapshot: HistorySnapshot = serde_json::from_slice(guard.value())
                    .context("Failed to deserialize history snapshot")?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Removes the stored snapshot for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the write transaction fails.
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(SESSION_TABLE)
                .context("Failed to open sessions table")?;
            let _ = table
                .remove(session_id)
                .context("Failed to remove session")?;
        }
        write_txn.commit().context("Failed to commit deletion")?;
        Ok(())
    }

    /// Lists all session IDs with a stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction fails.
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(SESSION_TABLE)
            .context("Failed to open sessions table")?;

        let mut session_ids = Vec::new();
        for entry in table.iter().context("Failed to iterate sessions table")? {
            let (key_guard, _) = entry.context("Failed to read session entry")?;
            session_ids.push(key_guard.value().to_string());
        }
        Ok(session_ids)
    }
}
