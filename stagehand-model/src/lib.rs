//! Shared record model for Stagehand.
//!
//! Defines the types every changeset component depends on:
//! - [`Record`]: a keyed record of JSON field values
//! - [`Model`]: a cloneable handle to an externally-owned record
//! - [`FieldKind`]: whether a field holds a primitive or a structurally complex value
//!
//! The model belongs to the host application. Changesets read through it freely
//! but only write into it while committing staged edits.

mod kind;
mod model;

pub use kind::FieldKind;
pub use model::{Model, Record};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while building a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model must be a JSON object, got {0}")]
    NotARecord(&'static str),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
