use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The structural shape of a field value.
///
/// Sequences and records are "complex": a changeset always stages them in a
/// private copy so that in-place edits never reach the model's own container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Strings, numbers, booleans and null.
    Primitive,
    /// A JSON array.
    Sequence,
    /// A nested JSON object.
    Record,
}

impl FieldKind {
    /// Classifies a value by its JSON shape.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Array(_) => Self::Sequence,
            Value::Object(_) => Self::Record,
            _ => Self::Primitive,
        }
    }

    /// Returns true for sequences and nested records.
    #[must_use]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::Sequence | Self::Record)
    }
}

/// Short name of a JSON value's type, used in error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
