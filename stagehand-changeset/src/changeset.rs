use crate::config::ChangesetConfig;
use crate::error::{ChangesetError, ChangesetResult};
use crate::orchestrator::Validation;
use crate::state::State;
use serde::Serialize;
use serde_json::Value;
use stagehand_model::{FieldKind, Model, Record};
use stagehand_validation::{ValidationDescriptor, ValidatorRegistry};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// Staged edits over a [`Model`], with per-field validation.
///
/// Reads go through [`get`](Self::get), writes through [`set`](Self::set)
/// and [`edit`](Self::edit). Nothing reaches the model until
/// [`commit`](Self::commit) or [`save`](Self::save).
///
/// Cloning a `Changeset` yields another handle to the same staged state. Use
/// [`partial`](Self::partial) for an independent changeset.
#[derive(Clone)]
pub struct Changeset {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub config: ChangesetConfig,
    pub model: Model,
    pub registry: ValidatorRegistry,
    /// Fields tracked since construction, in key order.
    pub fields: Vec<String>,
    pub kinds: HashMap<String, FieldKind>,
    state: Mutex<State>,
    /// Number of async validation chains still running.
    pub in_flight: watch::Sender<usize>,
    revision: watch::Sender<u64>,
}

/// A consistent copy of a changeset's observable state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangesetSnapshot {
    pub change: Record,
    pub errors: BTreeMap<String, ValidationDescriptor>,
    pub validating: BTreeSet<String>,
    pub dirty: BTreeSet<String>,
    pub generic_errors: Vec<String>,
    pub is_saving: bool,
    pub is_valid: bool,
    pub is_dirty: bool,
    pub revision: u64,
}

impl Inner {
    pub fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Signals observers that a group of state changes has landed. Callers
    /// hold the state lock so the revision matches what a snapshot sees.
    pub fn publish(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    pub fn kind(&self, field: &str) -> ChangesetResult<FieldKind> {
        self.kinds
            .get(field)
            .copied()
            .ok_or_else(|| ChangesetError::UnknownField(field.to_owned()))
    }

    /// The value a consumer sees for `field`.
    pub fn resolve(&self, state: &State, field: &str) -> Option<Value> {
        let kind = self.kinds.get(field)?;
        if kind.is_complex() || state.dirty.contains(field) {
            if let Some(staged) = state.shadow.get(field) {
                return Some(staged.clone());
            }
        }
        self.model.get(field)
    }

    /// The consumer-facing view of every tracked field.
    pub fn change(&self, state: &State) -> Record {
        self.fields
            .iter()
            .filter_map(|field| Some((field.clone(), self.resolve(state, field)?)))
            .collect()
    }

    /// Whether a finished run may still write its result.
    pub fn is_current(&self, state: &State, field: &str, generation: u64) -> bool {
        !self.config.discard_stale_results || state.generation(field) == generation
    }

    /// Stages `value` for `field` and updates its dirty flag.
    fn stage(&self, state: &mut State, field: &str, kind: FieldKind, value: Value) {
        let matches_model = self.model.with_field(field, |current| current == Some(&value));
        if matches_model {
            state.dirty.unmark(field);
        } else {
            state.dirty.mark(field);
        }

        if kind.is_complex() || !matches_model {
            state.shadow.insert(field, value);
        } else {
            state.shadow.remove(field);
        }
    }
}

impl Changeset {
    /// Builds a changeset with the default configuration.
    pub fn new(model: Model, registry: ValidatorRegistry) -> Self {
        Self::with_config(model, registry, ChangesetConfig::default())
    }

    /// Builds a changeset over the model's current fields.
    ///
    /// Sequence and record fields are copied into the shadow store right away
    /// so edits never touch the model's own containers.
    pub fn with_config(model: Model, registry: ValidatorRegistry, config: ChangesetConfig) -> Self {
        let record = model.snapshot();
        let mut state = State::default();
        let mut fields = Vec::with_capacity(record.len());
        let mut kinds = HashMap::with_capacity(record.len());

        for (field, value) in record {
            let kind = FieldKind::of(&value);
            if kind.is_complex() {
                state.shadow.insert(&field, value);
            }
            kinds.insert(field.clone(), kind);
            fields.push(field);
        }

        for field in registry.fields() {
            if !kinds.contains_key(field) {
                debug!(changeset = %config.label, field, "Validators registered for a field the model does not have");
            }
        }

        let (in_flight, _) = watch::channel(0);
        let (revision, _) = watch::channel(0);

        Self {
            inner: Arc::new(Inner {
                config,
                model,
                registry,
                fields,
                kinds,
                state: Mutex::new(state),
                in_flight,
                revision,
            }),
        }
    }

    /// The model this changeset stages edits for.
    pub fn model(&self) -> &Model {
        &self.inner.model
    }

    pub fn config(&self) -> &ChangesetConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.inner.registry
    }

    /// Tracked field names, in key order.
    pub fn fields(&self) -> &[String] {
        &self.inner.fields
    }

    pub fn tracks(&self, field: &str) -> bool {
        self.inner.kinds.contains_key(field)
    }

    /// The construction-time shape of a field.
    pub fn kind(&self, field: &str) -> Option<FieldKind> {
        self.inner.kinds.get(field).copied()
    }

    // ── Field access ─────────────────────────────────────────────

    /// Reads a field: the staged value if the field is dirty or complex,
    /// otherwise the model's current value. Never triggers validation.
    pub fn get(&self, field: &str) -> Option<Value> {
        let state = self.inner.lock();
        self.inner.resolve(&state, field)
    }

    /// The consumer-facing view of every field.
    pub fn change(&self) -> Record {
        let state = self.inner.lock();
        self.inner.change(&state)
    }

    /// Stages a new value for a field and validates it.
    ///
    /// Writing back the model's current value leaves the field clean.
    /// Complex fields always keep a private staged copy.
    pub fn set(&self, field: &str, value: Value) -> ChangesetResult<Validation> {
        let kind = self.inner.kind(field)?;
        self.ensure_runtime(field)?;

        {
            let mut state = self.inner.lock();
            self.inner.stage(&mut state, field, kind, value);
            self.inner.publish();
        }

        self.validate(Some(field))
    }

    /// Mutates a field's staged value in place, then marks it dirty and
    /// revalidates it.
    ///
    /// This is how consumers push into sequences or update nested records
    /// without rebinding the whole field. `f` runs under the changeset's lock
    /// and must not call back into the changeset.
    pub fn edit<R>(&self, field: &str, f: impl FnOnce(&mut Value) -> R) -> ChangesetResult<R> {
        let kind = self.inner.kind(field)?;
        self.ensure_runtime(field)?;

        let result = {
            let mut state = self.inner.lock();
            let seed = self.inner.resolve(&state, field).unwrap_or(Value::Null);
            let staged = state.shadow.get_or_stage(field, || seed);
            let result = f(staged);

            if kind.is_complex() {
                state.dirty.mark(field);
            } else if let Some(staged) = state.shadow.remove(field) {
                self.inner.stage(&mut state, field, kind, staged);
            }
            self.inner.publish();
            result
        };

        self.validate(Some(field))?;
        Ok(result)
    }

    // ── State ────────────────────────────────────────────────────

    /// True while any field is dirty.
    pub fn is_dirty(&self) -> bool {
        self.inner.lock().is_dirty()
    }

    pub fn is_field_dirty(&self, field: &str) -> bool {
        self.inner.lock().dirty.contains(field)
    }

    /// True when no field is validating and no field has an error.
    pub fn is_valid(&self) -> bool {
        self.inner.lock().is_valid()
    }

    /// True while any field's async validators are in flight.
    pub fn is_validating(&self) -> bool {
        !self.inner.lock().validating.is_empty()
    }

    pub fn is_field_validating(&self, field: &str) -> bool {
        self.inner.lock().validating.contains(field)
    }

    /// The failure descriptor recorded for a field, if it failed validation.
    pub fn error(&self, field: &str) -> Option<ValidationDescriptor> {
        self.inner.lock().errors.get(field).cloned()
    }

    pub fn errors(&self) -> BTreeMap<String, ValidationDescriptor> {
        self.inner.lock().errors.clone()
    }

    pub fn is_saving(&self) -> bool {
        self.inner.lock().is_saving
    }

    /// The most recent execution fault raised by an async validator.
    pub fn last_async_validation_error(&self) -> Option<Arc<anyhow::Error>> {
        self.inner.lock().last_async_fault.clone()
    }

    // ── Record-level errors ──────────────────────────────────────

    /// Records an error that belongs to the whole record, such as a server
    /// failure code.
    pub fn add_generic_error(&self, code: impl Into<String>) {
        let mut state = self.inner.lock();
        state.generic_errors.push(code.into());
        self.inner.publish();
    }

    pub fn generic_errors(&self) -> Vec<String> {
        self.inner.lock().generic_errors.clone()
    }

    /// The first record-level error.
    pub fn generic_error(&self) -> Option<String> {
        self.inner.lock().generic_errors.first().cloned()
    }

    // ── Observation ──────────────────────────────────────────────

    /// Takes a copy of all observable state in one critical section.
    pub fn snapshot(&self) -> ChangesetSnapshot {
        let state = self.inner.lock();
        ChangesetSnapshot {
            change: self.inner.change(&state),
            errors: state.errors.clone(),
            validating: state.validating.clone(),
            dirty: state.dirty.fields().clone(),
            generic_errors: state.generic_errors.clone(),
            is_saving: state.is_saving,
            is_valid: state.is_valid(),
            is_dirty: state.is_dirty(),
            revision: *self.inner.revision.borrow(),
        }
    }

    /// Subscribes to state revisions. The value increments once per atomic
    /// group of changes; read the new state with [`snapshot`](Self::snapshot).
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }
}

impl std::fmt::Debug for Changeset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Changeset")
            .field("label", &self.inner.config.label)
            .field("fields", &self.inner.fields)
            .finish_non_exhaustive()
    }
}
