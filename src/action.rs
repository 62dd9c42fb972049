/// Action contract and serialized history types.
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::ActionRegistry;

/// Registry tag for serialized action groups, the one tag the engine
/// resolves itself.
pub const GROUP_KIND: &str = "group";

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Hosts stamp actions with this at construction time.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// A reversible unit of work applied against host state `H`.
///
/// The host constructs an action at the moment a reversible change
/// happens, capturing enough before/after data to make `execute` and
/// `undo` exact inverses, then hands it to the [`HistoryManager`].
/// Actions are immutable once constructed; replay applies them to
/// whatever host value the caller passes in, and the engine never
/// inspects what they do.
///
/// [`HistoryManager`]: crate::manager::HistoryManager
pub trait Action<H> {
    /// Applies the action's effect to the host.
    fn execute(&self, host: &mut H);

    /// Reverts the action's effect on the host.
    fn undo(&self, host: &mut H);

    /// Human-readable label used for notifications.
    fn describe(&self) -> String;

    /// Creation time in milliseconds since the Unix epoch.
    fn timestamp(&self) -> i64;

    /// Converts the action into its tagged serialized form.
    fn to_record(&self) -> ActionRecord;
}

/// Serialized form of an action: a discriminated record with
/// variant-specific fields flattened alongside the common ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Tag resolved through the [`ActionRegistry`] on restore.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable label, carried verbatim across restores.
    pub description: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Variant-specific fields, flattened into the record.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl ActionRecord {
    /// Creates a record with the common fields and no variant fields.
    pub fn new(kind: impl Into<String>, description: impl Into<String>, timestamp: i64) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            timestamp,
            fields: serde_json::Map::new(),
        }
    }

    /// Adds a variant-specific field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Looks up a variant-specific field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl From<ActionRecord> for Value {
    fn from(record: ActionRecord) -> Self {
        let mut map = serde_json::Map::new();
        map.insert("type".to_string(), Value::String(record.kind));
        map.insert("description".to_string(), Value::String(record.description));
        map.insert("timestamp".to_string(), Value::from(record.timestamp));
        map.extend(record.fields);
        Value::Object(map)
    }
}

/// Persisted history document: serialized actions plus the cursor.
///
/// `cursor` is the index of the last applied action, `-1` when nothing
/// has been applied. This is the exact JSON layout written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub history: Vec<ActionRecord>,
    pub cursor: i64,
}

/// A composite action that applies several actions as one atomic step.
///
/// `execute` replays members in recorded order; `undo` reverts them in
/// reverse order, so a transaction of A then B unwinds as undo(B) then
/// undo(A).
pub struct ActionGroup<H> {
    actions: Vec<Box<dyn Action<H>>>,
    timestamp: i64,
}

impl<H: 'static> ActionGroup<H> {
    /// Wraps the given actions into one undo step.
    pub fn new(actions: Vec<Box<dyn Action<H>>>) -> Self {
        Self {
            actions,
            timestamp: now_ms(),
        }
    }

    /// Number of member actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Rebuilds a group from its serialized record.
    ///
    /// Members are reconstructed through the registry; a member whose
    /// tag is no longer registered is dropped with a warning rather
    /// than failing the whole group.
    ///
    /// # Errors
    ///
    /// Returns an error if the record has no `actions` array or a
    /// member is not a well-formed record.
    pub fn from_record(record: &ActionRecord, registry: &ActionRegistry<H>) -> Result<Self> {
        let members = record
            .field("actions")
            .and_then(Value::as_array)
            .context("Group record is missing its \"actions\" array")?;

        let mut actions: Vec<Box<dyn Action<H>>> = Vec::with_capacity(members.len());
        for member in members {
            let sub: ActionRecord = serde_json::from_value(member.clone())
                .context("Malformed member record in action group")?;
            match registry.reconstruct(&sub) {
                Ok(action) => actions.push(action),
                Err(e) => {
                    tracing::warn!("Dropping unrestorable group member \"{}\": {e:#}", sub.kind);
                }
            }
        }

        Ok(Self {
            actions,
            timestamp: record.timestamp,
        })
    }
}

impl<H> Action<H> for ActionGroup<H> {
    fn execute(&self, host: &mut H) {
        for action in &self.actions {
            action.execute(host);
        }
    }

    fn undo(&self, host: &mut H) {
        for action in self.actions.iter().rev() {
            action.undo(host);
        }
    }

    fn describe(&self) -> String {
        format!("{} changes", self.actions.len())
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn to_record(&self) -> ActionRecord {
        let members: Vec<Value> = self.actions.iter().map(|a| a.to_record().into()).collect();
        ActionRecord::new(GROUP_KIND, self.describe(), self.timestamp).with("actions", members)
    }
}
