//! Commit, reset and save: the only paths that write into the model or
//! discard staged state.

use crate::changeset::{Changeset, Inner};
use crate::error::{ChangesetError, ChangesetResult};
use crate::orchestrator::Validation;
use crate::saver::Saver;
use futures::future;
use serde_json::Value;
use stagehand_model::{Model, Record};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Holds `is_saving` for the duration of a save, including a save whose
/// future is dropped part way.
struct Saving<'a> {
    inner: &'a Arc<Inner>,
}

impl<'a> Saving<'a> {
    fn begin(inner: &'a Arc<Inner>) -> Self {
        let mut state = inner.lock();
        state.generic_errors.clear();
        state.is_saving = true;
        inner.publish();
        Self { inner }
    }
}

impl Drop for Saving<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        state.is_saving = false;
        self.inner.publish();
    }
}

impl Changeset {
    /// Writes every dirty field's staged value into the model.
    ///
    /// Does nothing and returns false unless the changeset is both valid and
    /// dirty. Sequences and records already in the model have their contents
    /// replaced rather than being swapped for new containers.
    pub fn commit(&self) -> bool {
        let mut state = self.inner.lock();
        if !(state.is_valid() && state.is_dirty()) {
            return false;
        }

        let committed = state.dirty.drain();
        let changes: Vec<(String, Value)> = committed
            .iter()
            .filter_map(|field| Some((field.clone(), state.shadow.remove(field)?)))
            .collect();
        self.inner.model.apply(changes);

        for field in &committed {
            if self.kind(field).is_some_and(|kind| kind.is_complex()) {
                if let Some(value) = self.inner.model.get(field) {
                    state.shadow.insert(field, value);
                }
            }
        }
        self.inner.publish();

        debug!(changeset = %self.inner.config.label, fields = ?committed, "Committed staged changes");
        true
    }

    /// Discards every staged edit and re-copies complex fields from the
    /// model's current values.
    ///
    /// Field errors are kept. When stale results are discarded, every field's
    /// generation advances, so async runs still in flight are superseded
    /// even after a fault has already cleared their `validating` flag.
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        state.shadow.clear();
        state.dirty.clear();

        for field in &self.inner.fields {
            if self.kind(field).is_some_and(|kind| kind.is_complex()) {
                if let Some(value) = self.inner.model.get(field) {
                    state.shadow.insert(field, value);
                }
            }
        }

        if self.inner.config.discard_stale_results {
            state.validating.clear();
            for field in &self.inner.fields {
                state.next_generation(field);
            }
        }
        self.inner.publish();

        debug!(changeset = %self.inner.config.label, "Reset staged changes");
    }

    /// Validates everything, commits, and hands the model to `saver`.
    ///
    /// Returns `Ok(false)` without calling the saver when validation fails.
    /// The commit happens even when nothing is dirty. A successful save
    /// resets the changeset; a rejected one leaves staged state as it is. A
    /// saver fault comes back as [`ChangesetError::Save`].
    pub async fn save<S: Saver + ?Sized>(&self, saver: &S) -> ChangesetResult<bool> {
        let _saving = Saving::begin(&self.inner);
        info!(changeset = %self.inner.config.label, "Saving changeset");

        if !self.validate(None)?.await {
            debug!(changeset = %self.inner.config.label, "Save aborted: changeset is invalid");
            return Ok(false);
        }

        self.commit();

        match saver.save(&self.inner.model).await {
            Ok(true) => {
                drop(_saving);
                self.reset();
                info!(changeset = %self.inner.config.label, "Changeset saved");
                Ok(true)
            }
            Ok(false) => {
                info!(changeset = %self.inner.config.label, "Saver rejected the changeset");
                Ok(false)
            }
            Err(e) => {
                warn!(changeset = %self.inner.config.label, error = %e, "Saver failed");
                Err(ChangesetError::Save(e))
            }
        }
    }

    /// Builds an independent changeset over a subset of fields.
    ///
    /// The new model is seeded from this changeset's current view, and the
    /// new registry holds only the subset's validators.
    pub fn partial<S: AsRef<str>>(&self, fields: &[S]) -> ChangesetResult<Changeset> {
        let record: Record = {
            let state = self.inner.lock();
            fields
                .iter()
                .map(|field| {
                    let field = field.as_ref();
                    self.inner
                        .resolve(&state, field)
                        .map(|value| (field.to_owned(), value))
                        .ok_or_else(|| ChangesetError::UnknownField(field.to_owned()))
                })
                .collect::<ChangesetResult<_>>()?
        };

        Ok(Changeset::with_config(
            Model::new(record),
            self.inner.registry.subset(fields),
            self.inner.config.clone(),
        ))
    }

    /// Sets each of `other`'s fields on this changeset, running this
    /// changeset's own dirty tracking and validation.
    ///
    /// Fields this changeset does not track are skipped. The returned
    /// [`Validation`] resolves to [`is_valid`](Self::is_valid) once every
    /// validation the merge started has finished.
    pub fn merge(&self, other: &Changeset) -> ChangesetResult<Validation> {
        let mut pending = Vec::new();
        for field in other.fields() {
            if !self.tracks(field) {
                debug!(changeset = %self.inner.config.label, field = %field, "Skipping untracked field during merge");
                continue;
            }
            if let Some(value) = other.get(field) {
                if let Validation::Pending(validation) = self.set(field, value)? {
                    pending.push(validation);
                }
            }
        }

        if pending.is_empty() {
            return Ok(Validation::Settled(self.is_valid()));
        }
        let changeset = self.clone();
        Ok(Validation::Pending(Box::pin(async move {
            future::join_all(pending).await;
            changeset.is_valid()
        })))
    }
}
