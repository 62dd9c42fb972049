/// Cursor-based undo/redo manager over recorded actions.
///
/// The manager owns the ordered action history, a cursor marking the
/// last applied entry, and the grouping/persistence/reentrancy policy.
/// Side effects happen in the host state passed into `undo`/`redo`;
/// the engine never touches application data itself.
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::action::{Action, ActionGroup, HistorySnapshot};
use crate::config::HistoryConfig;
use crate::persistence::PersistenceLayer;
use crate::registry::ActionRegistry;

/// Manages undo/redo history for a single editing session.
///
/// Each session gets its own `HistoryManager` with an independent
/// history sequence; the manager is constructed explicitly and owned by
/// the session, so documents and tests run isolated instances. It can
/// optionally persist its history through a shared `PersistenceLayer`.
///
/// Single-threaded: all calls are expected to arrive synchronously
/// from the host's event handling. The `executing` flag guards against
/// records issued while a replay is unwinding; a multi-threaded host
/// needs a mutex or actor boundary around the whole manager instead.
pub struct HistoryManager<H> {
    /// Recorded actions, insertion order == chronological order.
    history: Vec<Box<dyn Action<H>>>,
    /// Index of the last applied action; `None` when nothing is applied.
    cursor: Option<usize>,
    /// Reentrancy guard, true only while an undo/redo is replaying.
    executing: bool,
    /// Whether records are currently buffered into an open group.
    grouping: bool,
    /// Actions buffered since `begin_group`.
    pending_group: Vec<Box<dyn Action<H>>>,
    /// Session identifier used as the persistence key.
    session_id: String,
    /// Configuration parameters.
    config: HistoryConfig,
    /// Resolves serialized action tags on restore.
    registry: ActionRegistry<H>,
    /// Optional disk persistence (None = in-memory only).
    persistence: Option<Arc<PersistenceLayer>>,
}

impl<H> fmt::Debug for HistoryManager<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryManager")
            .field("session_id", &self.session_id)
            .field("history_len", &self.history.len())
            .field("cursor", &self.cursor)
            .field("executing", &self.executing)
            .field("grouping", &self.grouping)
            .field("pending_len", &self.pending_group.len())
            .finish()
    }
}

impl<H: 'static> HistoryManager<H> {
    /// Creates a new empty HistoryManager.
    ///
    /// Pass `persistence: None` for in-memory-only mode (useful in
    /// tests or for scratch sessions that don't need disk persistence).
    pub fn new(
        session_id: String,
        config: HistoryConfig,
        registry: ActionRegistry<H>,
        persistence: Option<Arc<PersistenceLayer>>,
    ) -> Self {
        Self {
            history: Vec::new(),
            cursor: None,
            executing: false,
            grouping: false,
            pending_group: Vec::new(),
            session_id,
            config,
            registry,
            persistence,
        }
    }

    /// Creates an in-memory-only HistoryManager with default config.
    pub fn in_memory(registry: ActionRegistry<H>) -> Self {
        Self::new(String::from("memory"), HistoryConfig::default(), registry, None)
    }

    /// Loads persisted history for the session, or creates a fresh
    /// manager if nothing is stored.
    ///
    /// Entries that no longer reconstruct are recovered by dropping
    /// them (see [`restore`](Self::restore)).
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence layer fails to read or the
    /// stored snapshot is not a well-formed document.
    pub fn load_or_new(
        session_id: String,
        config: HistoryConfig,
        registry: ActionRegistry<H>,
        persistence: Option<Arc<PersistenceLayer>>,
    ) -> Result<Self> {
        let mut manager = Self::new(session_id, config, registry, persistence);
        let snapshot = match &manager.persistence {
            Some(pl) => pl
                .read_snapshot(&manager.session_id)
                .context("Failed to load history from disk")?,
            None => None,
        };
        if let Some(snapshot) = snapshot {
            manager.restore(&snapshot);
        }
        Ok(manager)
    }

    /// Returns the session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Number of recorded history entries.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Index of the last applied action, `None` when nothing is applied.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Whether undo is available.
    pub fn can_undo(&self) -> bool {
        self.cursor.is_some()
    }

    /// Whether redo is available.
    pub fn can_redo(&self) -> bool {
        self.next_index() < self.history.len()
    }

    /// Whether a group transaction is open.
    pub fn is_grouping(&self) -> bool {
        self.grouping
    }

    /// Records a freshly performed action.
    ///
    /// The host applies the change to its own state first, then hands
    /// the action over; recording never executes it. Calls made while
    /// an undo/redo is replaying are ignored: side effects produced by
    /// the replay itself must never re-enter the history. Inside an
    /// open group the action is buffered until `end_group`.
    pub fn record(&mut self, action: Box<dyn Action<H>>) {
        if self.executing {
            tracing::debug!("Ignoring record issued during replay");
            return;
        }
        if self.grouping {
            self.pending_group.push(action);
            return;
        }
        self.push_action(action);
        self.persist();
    }

    /// Opens a transaction: subsequent records buffer into one group.
    ///
    /// Opening a group while one is already open is a no-op
    /// continuation of the outer group; transactions do not nest.
    pub fn begin_group(&mut self) {
        if self.grouping {
            return;
        }
        self.grouping = true;
        self.pending_group.clear();
    }

    /// Closes the open transaction and records the buffered actions as
    /// a single atomic group.
    ///
    /// An empty group records nothing; calling without an open group is
    /// a no-op.
    pub fn end_group(&mut self) {
        if !self.grouping {
            return;
        }
        self.grouping = false;
        let pending = std::mem::take(&mut self.pending_group);
        if pending.is_empty() {
            return;
        }
        self.record(Box::new(ActionGroup::new(pending)));
    }

    /// Reverts the last applied action against the host.
    ///
    /// Returns the notification label for UI feedback, or `None` when
    /// there is nothing to undo (an expected UI state, not an error).
    pub fn undo(&mut self, host: &mut H) -> Option<String> {
        let index = self.cursor?;
        self.executing = true;
        self.history[index].undo(host);
        self.executing = false;
        self.cursor = index.checked_sub(1);
        self.persist();

        let label = format!("Undo: {}", self.history[index].describe());
        tracing::debug!("{label}");
        Some(label)
    }

    /// Re-applies the next undone action against the host.
    ///
    /// Returns the notification label, or `None` when there is nothing
    /// to redo.
    pub fn redo(&mut self, host: &mut H) -> Option<String> {
        let index = self.next_index();
        if index >= self.history.len() {
            return None;
        }
        self.executing = true;
        self.history[index].execute(host);
        self.executing = false;
        self.cursor = Some(index);
        self.persist();

        let label = format!("Redo: {}", self.history[index].describe());
        tracing::debug!("{label}");
        Some(label)
    }

    /// Drops all history, abandons any open group, and persists the
    /// empty state.
    pub fn clear(&mut self) {
        self.history.clear();
        self.cursor = None;
        self.grouping = false;
        self.pending_group.clear();
        self.persist();
    }

    /// Serializes the history and cursor into a snapshot document.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            history: self.history.iter().map(|a| a.to_record()).collect(),
            cursor: self.cursor.map_or(-1, |c| c as i64),
        }
    }

    /// Rebuilds the history from a snapshot through the registry.
    ///
    /// An entry whose tag is unknown (or whose factory rejects the
    /// record) is dropped with a warning; the cursor is shifted left
    /// past the dropped entries and clamped back into bounds. The
    /// history cap is re-applied in case the snapshot predates a
    /// smaller limit.
    pub fn restore(&mut self, snapshot: &HistorySnapshot) {
        let mut actions: Vec<Box<dyn Action<H>>> = Vec::with_capacity(snapshot.history.len());
        let mut cursor = snapshot.cursor;
        for (index, record) in snapshot.history.iter().enumerate() {
            match self.registry.reconstruct(record) {
                Ok(action) => actions.push(action),
                Err(e) => {
                    tracing::warn!(
                        "Dropping unrestorable history entry \"{}\": {e:#}",
                        record.kind
                    );
                    if (index as i64) <= snapshot.cursor {
                        cursor -= 1;
                    }
                }
            }
        }

        while actions.len() > self.config.max_history {
            actions.remove(0);
            cursor -= 1;
        }

        let last = actions.len() as i64 - 1;
        self.history = actions;
        self.cursor = usize::try_from(cursor.min(last)).ok();
        self.executing = false;
        self.grouping = false;
        self.pending_group.clear();
    }

    /// Index the next redo would apply, == history length when at the tip.
    fn next_index(&self) -> usize {
        self.cursor.map_or(0, |c| c + 1)
    }

    /// Appends an action, discarding the redo branch and enforcing the
    /// history cap.
    fn push_action(&mut self, action: Box<dyn Action<H>>) {
        let applied = self.next_index();
        if applied < self.history.len() {
            self.history.truncate(applied);
        }

        self.history.push(action);
        self.cursor = Some(self.history.len() - 1);

        if self.history.len() > self.config.max_history {
            self.history.remove(0);
            // Keep the cursor pointing at the same logical action.
            self.cursor = self.cursor.and_then(|c| c.checked_sub(1));
        }
    }

    /// Writes the current snapshot to disk.
    ///
    /// Storage failures are logged and swallowed; the in-memory
    /// history is unaffected.
    fn persist(&self) {
        let Some(pl) = &self.persistence else {
            return;
        };
        if let Err(e) = pl.write_snapshot(&self.session_id, &self.snapshot()) {
            tracing::warn!("Failed to persist history for {}: {e:#}", self.session_id);
        }
    }
}
