/// Reversible command history for interactive editors.
///
/// Hosts describe each state change as an `Action` (explicit
/// before/after data plus a serialized record, applied to or reverted
/// from host state) and hand it to a `HistoryManager`, which owns the
/// ordered history,
/// the cursor, grouped transactions, and crash-safe persistence of the
/// history itself. Replay applies stored actions to whatever host
/// state is passed in; the engine never renders or inspects
/// application data.
///
/// The conventional trigger surface is Ctrl/Cmd+Z for undo and
/// Ctrl/Cmd+Shift+Z or Ctrl/Cmd+Y for redo; key bindings live in the
/// host, not here.
pub mod action;
pub mod config;
pub mod manager;
pub mod persistence;
pub mod registry;

pub use action::{now_ms, Action, ActionGroup, ActionRecord, HistorySnapshot, GROUP_KIND};
pub use config::HistoryConfig;
pub use manager::HistoryManager;
pub use persistence::PersistenceLayer;
pub use registry::{ActionFactory, ActionRegistry};
