use crate::kind::json_type_name;
use crate::ModelError;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A keyed record of JSON field values.
pub type Record = serde_json::Map<String, Value>;

/// A shared handle to the host application's record.
///
/// Cloning a `Model` yields another handle to the same record, so the host and
/// any changeset built over it observe the same values. The record's top-level
/// keys at the time a changeset is constructed define that changeset's fields.
#[derive(Clone, Default)]
pub struct Model {
    record: Arc<RwLock<Record>>,
}

impl Model {
    /// Wraps a record in a new shared handle.
    #[must_use]
    pub fn new(record: Record) -> Self {
        Self {
            record: Arc::new(RwLock::new(record)),
        }
    }

    /// Builds a model from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> crate::Result<Self> {
        match value {
            Value::Object(record) => Ok(Self::new(record)),
            other => Err(ModelError::NotARecord(json_type_name(&other))),
        }
    }

    /// Parses a model from a JSON string.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.record.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.record.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of a field's current value.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.read().get(field).cloned()
    }

    /// Extracts a string field.
    pub fn get_str(&self, field: &str) -> Option<String> {
        self.read()
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::to_owned)
    }

    /// Extracts a boolean field.
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.read().get(field).and_then(|v| v.as_bool())
    }

    /// Extracts a numeric field.
    pub fn get_number(&self, field: &str) -> Option<f64> {
        self.read().get(field).and_then(|v| v.as_f64())
    }

    /// Runs `f` against the current value of a field without cloning it.
    pub fn with_field<R>(&self, field: &str, f: impl FnOnce(Option<&Value>) -> R) -> R {
        f(self.read().get(field))
    }

    /// Writes a field directly, returning the previous value.
    ///
    /// This is the host's own write path. Changesets never call it.
    pub fn insert(&self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.write().insert(field.into(), value)
    }

    /// Writes a batch of field values under a single lock.
    ///
    /// Arrays and objects that already exist in the record have their contents
    /// replaced in place instead of being rebound to a new container.
    pub fn apply(&self, changes: impl IntoIterator<Item = (String, Value)>) {
        let mut record = self.write();
        for (field, value) in changes {
            let Some(slot) = record.get_mut(&field) else {
                record.insert(field, value);
                continue;
            };
            match (slot, value) {
                (Value::Array(dest), Value::Array(src)) => {
                    dest.clear();
                    dest.extend(src);
                }
                (Value::Object(dest), Value::Object(src)) => {
                    dest.clear();
                    dest.extend(src);
                }
                (slot, value) => *slot = value,
            }
        }
    }

    /// Returns the record's field names in key order.
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Returns true if the record has a field with this name.
    pub fn contains_key(&self, field: &str) -> bool {
        self.read().contains_key(field)
    }

    /// Number of fields in the record.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns a deep copy of the whole record.
    pub fn snapshot(&self) -> Record {
        self.read().clone()
    }

    /// Returns true if both handles point at the same record.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }
}

impl From<Record> for Model {
    fn from(record: Record) -> Self {
        Self::new(record)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Model").field(&*self.read()).finish()
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.read().serialize(serializer)
    }
}
