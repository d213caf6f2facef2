//! Error types for changeset operations.

use thiserror::Error;

/// Result type for changeset operations.
pub type ChangesetResult<T> = Result<T, ChangesetError>;

/// Errors that can occur in changeset operations.
///
/// Validation failures are not errors: they are recorded per field and read
/// back through [`Changeset::error`](crate::Changeset::error).
#[derive(Debug, Error)]
pub enum ChangesetError {
    /// The field was not part of the model when the changeset was built.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// An async-validated field was touched outside a tokio runtime.
    #[error("field {field} has async validators but no tokio runtime is running")]
    NoRuntime { field: String },

    /// The saver failed. The inner error is the saver's own, unchanged.
    #[error(transparent)]
    Save(anyhow::Error),
}
