/// Configuration and session identity helpers for the history engine.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum number of history entries kept per session before the
/// oldest is evicted.
const DEFAULT_MAX_HISTORY: usize = 100;

/// Configuration for a history session.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Cap on the history sequence; recording beyond it evicts the
    /// oldest entry.
    pub max_history: usize,
    /// Root directory for the persistence database.
    pub data_dir: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            data_dir: resolve_data_dir(),
        }
    }
}

/// Resolves the data directory path.
///
/// Resolution order:
/// 1. `RETRACE_DATA_DIR` environment variable
/// 2. `.data/` directory next to the executable
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("RETRACE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
    exe.parent().unwrap_or(Path::new(".")).join(".data")
}

/// Generates a session ID for a document backed by a file on disk.
///
/// Uses a hash of the canonical path for stability across runs.
pub fn session_id_for_path(path: &Path) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    format!("doc-{:016x}", hasher.finish())
}

/// Counter for generating unique scratch session IDs within a process.
static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a unique session ID for a scratch (unsaved) document.
pub fn generate_session_id() -> String {
    let count = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("scratch-{count}")
}
