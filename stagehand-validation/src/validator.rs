//! The validator contract.
//!
//! Validators come in two flavours. The flavour is fixed when the
//! [`Validator`] is built, so a registry can classify a field without
//! invoking anything.

use crate::outcome::ValidationOutcome;
use async_trait::async_trait;
use serde_json::Value;
use stagehand_model::Record;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A validator that answers immediately.
pub trait SyncValidator: Send + Sync {
    /// Checks `value` as the candidate for field `key`. `view` is the
    /// changeset's current view of every field.
    fn validate(&self, key: &str, value: &Value, view: &Record) -> ValidationOutcome;
}

/// A validator that suspends, e.g. to ask a server whether a name is taken.
///
/// An `Err` is an execution fault, not a validation failure.
#[async_trait]
pub trait AsyncValidator: Send + Sync {
    async fn validate(
        &self,
        key: &str,
        value: &Value,
        view: &Record,
    ) -> anyhow::Result<ValidationOutcome>;
}

struct SyncFn<F>(F);

impl<F> SyncValidator for SyncFn<F>
where
    F: Fn(&str, &Value, &Record) -> ValidationOutcome + Send + Sync,
{
    fn validate(&self, key: &str, value: &Value, view: &Record) -> ValidationOutcome {
        (self.0)(key, value, view)
    }
}

struct AsyncFn<F>(F);

#[async_trait]
impl<F, Fut> AsyncValidator for AsyncFn<F>
where
    F: Fn(String, Value, Record) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ValidationOutcome>> + Send + 'static,
{
    async fn validate(
        &self,
        key: &str,
        value: &Value,
        view: &Record,
    ) -> anyhow::Result<ValidationOutcome> {
        (self.0)(key.to_owned(), value.clone(), view.clone()).await
    }
}

/// A single validator, tagged synchronous or asynchronous.
#[derive(Clone)]
pub enum Validator {
    Sync(Arc<dyn SyncValidator>),
    Async(Arc<dyn AsyncValidator>),
}

impl Validator {
    /// Wraps a synchronous closure.
    pub fn sync_fn<F>(f: F) -> Self
    where
        F: Fn(&str, &Value, &Record) -> ValidationOutcome + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(SyncFn(f)))
    }

    /// Wraps an async closure. Arguments are passed owned so the returned
    /// future can outlive the call.
    pub fn async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(String, Value, Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ValidationOutcome>> + Send + 'static,
    {
        Self::Async(Arc::new(AsyncFn(f)))
    }

    pub fn from_sync(validator: impl SyncValidator + 'static) -> Self {
        Self::Sync(Arc::new(validator))
    }

    pub fn from_async(validator: impl AsyncValidator + 'static) -> Self {
        Self::Async(Arc::new(validator))
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    /// Runs the validator. Synchronous validators never fault.
    pub async fn run(
        &self,
        key: &str,
        value: &Value,
        view: &Record,
    ) -> anyhow::Result<ValidationOutcome> {
        match self {
            Self::Sync(v) => Ok(v.validate(key, value, view)),
            Self::Async(v) => v.validate(key, value, view).await,
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Validator::Sync"),
            Self::Async(_) => f.write_str("Validator::Async"),
        }
    }
}
