//! Staged state held by a changeset.
//!
//! Everything in [`State`] sits behind one mutex, so any group of fields
//! updated in a single critical section (a shadow value and its dirty flag,
//! a field's `validating` flag and its error) is observed all together or
//! not at all.

use serde_json::Value;
use stagehand_validation::ValidationDescriptor;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Staged values, keyed by field.
#[derive(Debug, Default)]
pub(crate) struct ShadowStore {
    values: HashMap<String, Value>,
}

impl ShadowStore {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn insert(&mut self, field: &str, value: Value) {
        self.values.insert(field.to_owned(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field)
    }

    /// Returns the staged value, staging `seed()` first if there is none.
    pub fn get_or_stage(&mut self, field: &str, seed: impl FnOnce() -> Value) -> &mut Value {
        self.values.entry(field.to_owned()).or_insert_with(seed)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Names of fields whose staged value diverges from the model.
#[derive(Debug, Default)]
pub(crate) struct DirtyTracker {
    fields: BTreeSet<String>,
}

impl DirtyTracker {
    pub fn mark(&mut self, field: &str) {
        if !self.fields.contains(field) {
            self.fields.insert(field.to_owned());
        }
    }

    pub fn unmark(&mut self, field: &str) {
        self.fields.remove(field);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Removes and returns every dirty field, in name order.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.fields).into_iter().collect()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }
}

/// All mutable changeset state.
#[derive(Debug, Default)]
pub(crate) struct State {
    pub shadow: ShadowStore,
    pub dirty: DirtyTracker,
    pub errors: BTreeMap<String, ValidationDescriptor>,
    pub validating: BTreeSet<String>,
    pub generic_errors: Vec<String>,
    pub is_saving: bool,
    pub last_async_fault: Option<Arc<anyhow::Error>>,
    /// Per-field token of the latest validation run.
    generations: HashMap<String, u64>,
}

impl State {
    pub fn is_valid(&self) -> bool {
        self.validating.is_empty() && self.errors.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Starts a new validation run for `field` and returns its token.
    pub fn next_generation(&mut self, field: &str) -> u64 {
        let generation = self.generations.entry(field.to_owned()).or_insert(0);
        *generation += 1;
        *generation
    }

    pub fn generation(&self, field: &str) -> u64 {
        self.generations.get(field).copied().unwrap_or(0)
    }
}
