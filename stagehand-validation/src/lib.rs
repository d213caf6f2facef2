//! Validation primitives for Stagehand changesets.
//!
//! This crate defines everything a changeset needs to know about validators
//! without knowing what any particular validator checks:
//!
//! - [`Validator`]: a synchronous or asynchronous check, tagged at construction
//! - [`ValidatorRegistry`]: the static field → validators mapping
//! - [`ValidationOutcome`] / [`FailedValidation`]: what a validator reports
//! - [`describe`]: turns a failure into a presentation-ready [`ValidationDescriptor`]
//! - [`reduce_serial`]: a strictly-ordered async fold
//! - [`run_validations`]: whole-record batch validation built on the fold
//!
//! # Validator contract
//!
//! A validator receives the field key, the candidate value and a snapshot of
//! the changeset's current view. It returns [`ValidationOutcome::Valid`] or a
//! [`FailedValidation`]. Asynchronous validators may additionally fail with an
//! execution fault (`anyhow::Error`), which is a bug surface rather than a
//! validation result.

mod batch;
mod describe;
mod outcome;
mod reduce;
mod registry;
mod validator;

pub use batch::run_validations;
pub use describe::{describe, field_label, fallback_descriptor};
pub use outcome::{FailedValidation, Message, MessageFn, ValidationDescriptor, ValidationOutcome};
pub use reduce::{reduce_serial, reduce_serial_unseeded};
pub use registry::{FieldValidators, ValidatorRegistry};
pub use validator::{AsyncValidator, SyncValidator, Validator};
