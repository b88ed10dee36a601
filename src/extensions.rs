//! Native extension entry points.
//!
//! An extension is a plain function that installs builtins into an
//! interpreter. Entries collect in an [`ExtensionRegistry`]; the process-wide
//! registry feeds [`Interpreter::new`], while
//! [`Interpreter::with_extensions`] takes an explicit one so hosts and tests can
//! build instances with a controlled extension set.
//!
//! Lifecycle of the global registry: entries are only ever appended, and an
//! interpreter reads a snapshot once during construction. Registering an
//! entry later has no effect on instances that already exist.

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::runtime::Interpreter;

pub type EntryFunction = fn(&mut Interpreter);

#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    entries: Vec<EntryFunction>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_entry(&mut self, entry: EntryFunction) {
        self.entries.push(entry);
    }

    pub fn with_entry(mut self, entry: EntryFunction) -> Self {
        self.register_entry(entry);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every entry against `interpreter`, in registration order.
    pub fn install(&self, interpreter: &mut Interpreter) {
        for entry in &self.entries {
            entry(interpreter);
        }
    }
}

static GLOBAL_ENTRIES: Lazy<Mutex<ExtensionRegistry>> =
    Lazy::new(|| Mutex::new(ExtensionRegistry::new()));

/// Append an entry to the process-wide registry.
pub fn register_entry(entry: EntryFunction) {
    GLOBAL_ENTRIES.lock().register_entry(entry);
    tracing::debug!("registered global extension entry");
}

/// Copy of the process-wide registry. The lock is not held once this returns,
/// so entries may themselves call [`register_entry`].
pub fn global_snapshot() -> ExtensionRegistry {
    GLOBAL_ENTRIES.lock().clone()
}
