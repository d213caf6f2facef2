//! Failure descriptor builder.
//!
//! Pure functions that turn a [`FailedValidation`] into the
//! `{descriptor, values}` pair a presentation layer formats.

use crate::outcome::{FailedValidation, Message, ValidationDescriptor};
use heck::ToSnakeCase;
use serde_json::Value;

/// Builds the descriptor for a failed validation.
///
/// A generator message is invoked with `(kind, key, context)` and its result
/// returned as-is. Otherwise the descriptor is the message text (or a
/// type-keyed fallback) and the values are the context plus a readable `key`
/// label and the failure `type`.
pub fn describe(failed: &FailedValidation) -> ValidationDescriptor {
    let descriptor = match &failed.message {
        Some(Message::Generator(generate)) => {
            return generate(&failed.kind, &failed.key, &failed.context);
        }
        Some(Message::Text(text)) => text.clone(),
        None => fallback_descriptor(&failed.kind),
    };

    let mut values = failed.context.clone();
    values.insert("key".into(), Value::String(field_label(&failed.key)));
    values.insert("type".into(), Value::String(failed.kind.clone()));

    ValidationDescriptor { descriptor, values }
}

/// The descriptor used when a failure carries no message.
pub fn fallback_descriptor(kind: &str) -> String {
    format!("messages.{kind}")
}

/// Turns a field key into a capitalized label: `firstName` → `First name`.
///
/// Every word separator becomes a space, so `first_name_long` reads
/// `First name long` rather than keeping the later underscores.
pub fn field_label(key: &str) -> String {
    let words = key.to_snake_case().replace('_', " ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
