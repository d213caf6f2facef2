use crate::outcome::ValidationOutcome;
use crate::validator::Validator;
use serde_json::Value;
use stagehand_model::Record;
use std::collections::BTreeMap;
use tracing::warn;

/// The ordered validators configured for one field.
///
/// A field is classified asynchronous when any of its validators is
/// asynchronous. Synchronous validators listed next to an asynchronous one
/// run inside the asynchronous chain.
#[derive(Debug, Clone, Default)]
pub struct FieldValidators {
    validators: Vec<Validator>,
    is_async: bool,
}

impl FieldValidators {
    pub fn new(validators: Vec<Validator>) -> Self {
        let is_async = validators.iter().any(Validator::is_async);
        Self {
            validators,
            is_async,
        }
    }

    /// Whether this field is validated through the asynchronous path.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// True when sync and async validators are mixed on the field.
    #[must_use]
    pub fn is_mixed(&self) -> bool {
        self.is_async && self.validators.iter().any(|v| !v.is_async())
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter()
    }

    /// Runs the synchronous validators in order and returns the first
    /// failure. Asynchronous validators are skipped; callers only use this
    /// for fields classified synchronous.
    pub fn check(&self, key: &str, value: &Value, view: &Record) -> ValidationOutcome {
        for validator in &self.validators {
            if let Validator::Sync(v) = validator {
                let outcome = v.validate(key, value, view);
                if !outcome.is_valid() {
                    return outcome;
                }
            }
        }
        ValidationOutcome::Valid
    }
}

impl From<Validator> for FieldValidators {
    fn from(validator: Validator) -> Self {
        Self::new(vec![validator])
    }
}

impl From<Vec<Validator>> for FieldValidators {
    fn from(validators: Vec<Validator>) -> Self {
        Self::new(validators)
    }
}

impl<const N: usize> From<[Validator; N]> for FieldValidators {
    fn from(validators: [Validator; N]) -> Self {
        Self::new(validators.into())
    }
}

/// Static mapping from field name to its validators.
#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    fields: BTreeMap<String, FieldValidators>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, validators: impl Into<FieldValidators>) -> Self {
        self.insert(field, validators);
        self
    }

    /// Registers the validators for a field, replacing any previous entry.
    pub fn insert(&mut self, field: impl Into<String>, validators: impl Into<FieldValidators>) {
        let field = field.into();
        let validators = validators.into();
        if validators.is_mixed() {
            warn!(
                field = %field,
                "Field mixes sync and async validators; all of them run on the async path"
            );
        }
        self.fields.insert(field, validators);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValidators> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Whether a field is validated asynchronously. Unregistered fields are not.
    pub fn is_async(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(FieldValidators::is_async)
    }

    /// Field names with registered validators, in key order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A registry holding only the named fields' entries.
    pub fn subset<S: AsRef<str>>(&self, fields: &[S]) -> Self {
        let fields = fields
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                self.fields
                    .get(name)
                    .map(|validators| (name.to_owned(), validators.clone()))
            })
            .collect();
        Self { fields }
    }
}
