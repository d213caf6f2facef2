use serde::{Deserialize, Serialize};
use serde_json::Value;
use stagehand_model::Record;
use std::fmt;
use std::sync::Arc;

/// Builds a descriptor directly from `(type, key, context)`.
pub type MessageFn = dyn Fn(&str, &str, &Record) -> ValidationDescriptor + Send + Sync;

/// Presentation-ready form of a failed validation: a message key plus the
/// values to interpolate into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDescriptor {
    pub descriptor: String,
    pub values: Record,
}

impl ValidationDescriptor {
    pub fn new(descriptor: impl Into<String>, values: Record) -> Self {
        Self {
            descriptor: descriptor.into(),
            values,
        }
    }
}

/// The message attached to a failure.
#[derive(Clone)]
pub enum Message {
    /// A message key or literal text, used as the descriptor.
    Text(String),
    /// A generator whose output is used verbatim.
    Generator(Arc<MessageFn>),
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Generator(a), Self::Generator(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A validator's report that a candidate value was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedValidation {
    /// Failure type, e.g. `"required"` or `"unique"`.
    pub kind: String,
    /// The field key the validator ran against.
    pub key: String,
    pub message: Option<Message>,
    /// Extra interpolation data (limits, expected formats, ...).
    pub context: Record,
}

impl FailedValidation {
    pub fn new(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
            message: None,
            context: Record::new(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<Message>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&str, &str, &Record) -> ValidationDescriptor + Send + Sync + 'static,
    {
        self.message = Some(Message::Generator(Arc::new(generator)));
        self
    }

    #[must_use]
    pub fn with_context(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(name.into(), value.into());
        self
    }
}

/// What a validator returns.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(FailedValidation),
}

impl ValidationOutcome {
    /// Shorthand for `Invalid(FailedValidation::new(kind, key))`.
    pub fn invalid(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Invalid(FailedValidation::new(kind, key))
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Returns the failure, if any.
    pub fn failure(&self) -> Option<&FailedValidation> {
        match self {
            Self::Valid => None,
            Self::Invalid(failed) => Some(failed),
        }
    }
}

impl From<FailedValidation> for ValidationOutcome {
    fn from(failed: FailedValidation) -> Self {
        Self::Invalid(failed)
    }
}

impl From<Result<(), FailedValidation>> for ValidationOutcome {
    fn from(result: Result<(), FailedValidation>) -> Self {
        match result {
            Ok(()) => Self::Valid,
            Err(failed) => Self::Invalid(failed),
        }
    }
}
