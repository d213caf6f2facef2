//! Validation orchestration.
//!
//! Each field moves through `idle → validating → {valid, invalid}`.
//! Synchronous fields finish inside the call that triggered them. Async
//! fields run their chain on a spawned task, one validator at a time, and
//! report back into the shared state when done.
//!
//! Every run carries a per-field generation token. A newer edit, validation
//! or reset of the field supersedes older runs; with
//! [`ChangesetConfig::discard_stale_results`](crate::ChangesetConfig) set,
//! a superseded run leaves `error` and `validating` alone.

use crate::changeset::{Changeset, Inner};
use crate::error::{ChangesetError, ChangesetResult};
use crate::state::State;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use stagehand_model::Record;
use stagehand_validation::{describe, FieldValidators, ValidationOutcome};
use std::any::Any;
use std::fmt;
use std::future::IntoFuture;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The result of [`Changeset::validate`].
///
/// `Settled` when every targeted field is synchronous, `Pending` when at
/// least one async chain is running. Awaiting either yields the validity.
pub enum Validation {
    Settled(bool),
    Pending(BoxFuture<'static, bool>),
}

impl Validation {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// The validity, if already known.
    pub fn settled(&self) -> Option<bool> {
        match self {
            Self::Settled(valid) => Some(*valid),
            Self::Pending(_) => None,
        }
    }

    /// Waits for every targeted chain to finish.
    pub async fn resolve(self) -> bool {
        self.await
    }
}

impl IntoFuture for Validation {
    type Output = bool;
    type IntoFuture = BoxFuture<'static, bool>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Settled(valid) => future::ready(valid).boxed(),
            Self::Pending(pending) => pending,
        }
    }
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settled(valid) => f.debug_tuple("Settled").field(valid).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Counts one async chain as in flight for as long as it lives.
///
/// Dropping it also clears the field's `validating` flag if its run is still
/// the latest, so a panicking validator cannot leave the field stuck.
struct InFlight {
    inner: Arc<Inner>,
    field: String,
    generation: u64,
}

impl InFlight {
    fn enter(inner: Arc<Inner>, field: String, generation: u64) -> Self {
        inner.in_flight.send_modify(|count| *count += 1);
        Self {
            inner,
            field,
            generation,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        {
            let mut state = self.inner.lock();
            if state.generation(&self.field) == self.generation
                && state.validating.remove(&self.field)
            {
                self.inner.publish();
            }
        }
        self.inner
            .in_flight
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}

impl Inner {
    /// Applies a run's result if the run is still current.
    fn settle(&self, field: &str, generation: u64, apply: impl FnOnce(&mut State)) {
        let mut state = self.lock();
        if !self.is_current(&state, field, generation) {
            debug!(changeset = %self.config.label, field, generation, "Discarding stale validation result");
            return;
        }
        apply(&mut state);
        self.publish();
    }

    fn record_fault(&self, field: &str, generation: u64, fault: anyhow::Error) {
        warn!(
            changeset = %self.config.label,
            field,
            error = %fault,
            "Async validator faulted; continuing with the next validator"
        );
        let mut state = self.lock();
        state.last_async_fault = Some(Arc::new(fault));
        if self.is_current(&state, field, generation) {
            state.validating.remove(field);
        }
        self.publish();
    }

    /// Runs a field's chain in order on the value captured when the run
    /// started.
    ///
    /// A failure stops the chain. A fault, returned as `Err` or raised as a
    /// panic, is recorded and the chain moves on to the next validator; if
    /// the chain then ends without a failure the field's error is cleared,
    /// even when the fault came from the last validator.
    async fn run_async_chain(
        &self,
        field: &str,
        validators: &FieldValidators,
        value: Value,
        view: Record,
        generation: u64,
    ) {
        for validator in validators.iter() {
            let run = AssertUnwindSafe(validator.run(field, &value, &view))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(panic_fault(&*payload)));

            match run {
                Ok(ValidationOutcome::Valid) => {}
                Ok(ValidationOutcome::Invalid(failed)) => {
                    let descriptor = describe(&failed);
                    debug!(changeset = %self.config.label, field, kind = %failed.kind, "Async validation failed");
                    self.settle(field, generation, |state| {
                        state.validating.remove(field);
                        state.errors.insert(field.to_owned(), descriptor);
                    });
                    return;
                }
                Err(fault) => self.record_fault(field, generation, fault),
            }
        }

        debug!(changeset = %self.config.label, field, "Async validation passed");
        self.settle(field, generation, |state| {
            state.validating.remove(field);
            state.errors.remove(field);
        });
    }
}

fn panic_fault(payload: &(dyn Any + Send)) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    anyhow::anyhow!("validator panicked: {message}")
}

impl Changeset {
    pub(crate) fn ensure_runtime(&self, field: &str) -> ChangesetResult<()> {
        if self.inner.registry.is_async(field) && Handle::try_current().is_err() {
            return Err(ChangesetError::NoRuntime {
                field: field.to_owned(),
            });
        }
        Ok(())
    }

    /// Validates one field, or every field when `field` is `None`.
    ///
    /// Resolves to the field's validity, or to [`is_valid`](Self::is_valid)
    /// when validating everything.
    pub fn validate(&self, field: Option<&str>) -> ChangesetResult<Validation> {
        let targets: Vec<String> = match field {
            Some(field) => {
                self.inner.kind(field)?;
                vec![field.to_owned()]
            }
            None => self.inner.fields.clone(),
        };
        for target in &targets {
            self.ensure_runtime(target)?;
        }

        let handles: Vec<JoinHandle<()>> = targets
            .iter()
            .filter_map(|target| self.run_field(target))
            .collect();

        let field = field.map(str::to_owned);
        if handles.is_empty() {
            return Ok(Validation::Settled(self.validity(field.as_deref())));
        }

        let changeset = self.clone();
        Ok(Validation::Pending(Box::pin(async move {
            for joined in future::join_all(handles).await {
                if let Err(e) = joined {
                    warn!(changeset = %changeset.inner.config.label, error = %e, "Validation task failed");
                    let mut state = changeset.inner.lock();
                    state.last_async_fault = Some(Arc::new(anyhow::anyhow!("validation task failed: {e}")));
                    changeset.inner.publish();
                }
            }
            changeset.validity(field.as_deref())
        })))
    }

    /// Waits until no async validation is in flight.
    pub async fn validation_finished(&self) {
        let mut in_flight = self.inner.in_flight.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = in_flight.wait_for(|count| *count == 0).await;
    }

    /// Number of async validation chains currently running.
    pub fn in_flight(&self) -> usize {
        *self.inner.in_flight.borrow()
    }

    fn validity(&self, field: Option<&str>) -> bool {
        let state = self.inner.lock();
        match field {
            Some(field) => !state.errors.contains_key(field),
            None => state.is_valid(),
        }
    }

    /// Starts validation of one field. Returns the task handle for async
    /// fields; sync fields are done when this returns.
    fn run_field(&self, field: &str) -> Option<JoinHandle<()>> {
        let validators = self.inner.registry.get(field)?;
        if validators.is_async() {
            Some(self.spawn_async_chain(field, validators.clone()))
        } else {
            self.run_sync_chain(field, validators);
            None
        }
    }

    fn run_sync_chain(&self, field: &str, validators: &FieldValidators) {
        let (value, view, generation) = {
            let mut state = self.inner.lock();
            let generation = state.next_generation(field);
            let value = self.inner.resolve(&state, field).unwrap_or(Value::Null);
            (value, self.inner.change(&state), generation)
        };

        let descriptor = validators
            .check(field, &value, &view)
            .failure()
            .map(describe);
        debug!(changeset = %self.inner.config.label, field, valid = descriptor.is_none(), "Validated field");

        self.inner.settle(field, generation, |state| match descriptor {
            Some(descriptor) => {
                state.errors.insert(field.to_owned(), descriptor);
            }
            None => {
                state.errors.remove(field);
            }
        });
    }

    fn spawn_async_chain(&self, field: &str, validators: FieldValidators) -> JoinHandle<()> {
        let (value, view, generation) = {
            let mut state = self.inner.lock();
            let generation = state.next_generation(field);
            state.validating.insert(field.to_owned());
            self.inner.publish();
            let value = self.inner.resolve(&state, field).unwrap_or(Value::Null);
            (value, self.inner.change(&state), generation)
        };
        debug!(changeset = %self.inner.config.label, field, generation, "Started async validation");

        let guard = InFlight::enter(self.inner.clone(), field.to_owned(), generation);
        let inner = self.inner.clone();
        let field = field.to_owned();
        tokio::spawn(async move {
            let _guard = guard;
            inner
                .run_async_chain(&field, &validators, value, view, generation)
                .await;
        })
    }
}
