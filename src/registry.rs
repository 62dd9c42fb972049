/// Host-extensible resolution of serialized action tags.
use std::collections::HashMap;
use std::fmt;

use anyhow::{bail, Context, Result};

use crate::action::{Action, ActionGroup, ActionRecord, GROUP_KIND};

/// Factory that rebuilds an action from its serialized record.
pub type ActionFactory<H> = Box<dyn Fn(&ActionRecord) -> Result<Box<dyn Action<H>>>>;

/// Maps serialized action tags to reconstruction factories.
///
/// The engine itself resolves only the built-in [`GROUP_KIND`] tag;
/// every other tag must be registered by the host before `restore` can
/// rebuild its actions. The registry is handed to the
/// [`HistoryManager`] at construction.
///
/// [`HistoryManager`]: crate::manager::HistoryManager
pub struct ActionRegistry<H> {
    factories: HashMap<String, ActionFactory<H>>,
}

impl<H> fmt::Debug for ActionRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("ActionRegistry").field("kinds", &kinds).finish()
    }
}

impl<H: 'static> Default for ActionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: 'static> ActionRegistry<H> {
    /// Creates a registry resolving only the built-in group tag.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers a factory for a host action tag.
    ///
    /// Re-registering a tag replaces the previous factory.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&ActionRecord) -> Result<Box<dyn Action<H>>> + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    /// Whether a tag can be resolved.
    pub fn contains(&self, kind: &str) -> bool {
        kind == GROUP_KIND || self.factories.contains_key(kind)
    }

    /// Rebuilds an action from its record.
    ///
    /// Group records recurse through this registry for their members.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is unknown or the factory rejects
    /// the record.
    pub fn reconstruct(&self, record: &ActionRecord) -> Result<Box<dyn Action<H>>> {
        if record.kind == GROUP_KIND {
            let group = ActionGroup::from_record(record, self)
                .context("Failed to rebuild action group")?;
            return Ok(Box::new(group));
        }
        match self.factories.get(&record.kind) {
            Some(factory) => factory(record).with_context(|| {
                format!("Factory for action type \"{}\" rejected the record", record.kind)
            }),
            None => bail!("Unknown action type \"{}\"", record.kind),
        }
    }
}
