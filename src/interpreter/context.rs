//! Execution context
//!
//! One [`ExecutionContext`] exists per run. It is owned by the executor,
//! mutated by steps, and dropped at the end of the run except for the
//! variable snapshot returned to the caller.

use std::collections::HashMap;

use serde_json::{Map, Value as JsonValue};

use super::providers::ChatTurn;

/// Variable store with case-insensitive names.
///
/// The spelling of the most recent binding is kept for snapshots.
#[derive(Debug, Clone, Default)]
pub struct VarStore {
    entries: HashMap<String, (String, JsonValue)>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(vars: &Map<String, JsonValue>) -> Self {
        let mut store = Self::new();
        for (name, value) in vars {
            store.set(name, value.clone());
        }
        store
    }

    pub fn set(&mut self, name: &str, value: JsonValue) {
        self.entries
            .insert(name.to_lowercase(), (name.to_string(), value));
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.entries.get(&name.to_lowercase()).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of all bindings under their last-written names.
    pub fn snapshot(&self) -> Map<String, JsonValue> {
        self.entries
            .values()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Mutable state of a single run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub vars: VarStore,
    input: Map<String, JsonValue>,
    pub log: Vec<ChatTurn>,
    pub final_text: String,
}

impl ExecutionContext {
    pub fn new(input: Map<String, JsonValue>) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    pub fn with_vars(mut self, vars: VarStore) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_log(mut self, log: Vec<ChatTurn>) -> Self {
        self.log = log;
        self
    }

    /// Read-only input map.
    pub fn input(&self) -> &Map<String, JsonValue> {
        &self.input
    }
}
