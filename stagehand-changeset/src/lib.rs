//! Staged edits with validation for Stagehand.
//!
//! A [`Changeset`] sits in front of a [`Model`](stagehand_model::Model) and
//! lets a caller edit fields, validate them per field (synchronously or
//! asynchronously), and then commit the edits into the model or throw them
//! away.
//!
//! # Architecture
//!
//! - **Shadow store**: staged values. Primitive fields are staged on first
//!   edit; sequences and records are always staged so in-place edits never
//!   alias the model.
//! - **Dirty tracker**: fields whose staged value differs from the model.
//! - **Orchestrator**: runs a field's validators in registration order and
//!   records the result in the error state. Async chains run on tokio tasks.
//! - **Transactions**: [`Changeset::commit`], [`Changeset::reset`] and
//!   [`Changeset::save`] are the only paths that write into the model or
//!   discard staged state.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use stagehand_changeset::Changeset;
//! use stagehand_model::Model;
//! use stagehand_validation::{ValidationOutcome, Validator, ValidatorRegistry};
//!
//! let model = Model::from_value(json!({"username": "Lance"})).unwrap();
//! let registry = ValidatorRegistry::new().with(
//!     "username",
//!     Validator::sync_fn(|key, value, _| match value.as_str() {
//!         Some(s) if !s.is_empty() => ValidationOutcome::Valid,
//!         _ => ValidationOutcome::invalid("required", key),
//!     }),
//! );
//!
//! let changeset = Changeset::new(model.clone(), registry);
//! changeset.set("username", json!("")).unwrap();
//! assert!(!changeset.is_valid());
//! assert!(!changeset.commit());
//!
//! changeset.set("username", json!("Marcus")).unwrap();
//! assert!(changeset.commit());
//! assert_eq!(model.get_str("username").as_deref(), Some("Marcus"));
//! ```

mod changeset;
mod config;
mod error;
mod orchestrator;
mod saver;
mod state;
mod transaction;

pub use changeset::{Changeset, ChangesetSnapshot};
pub use config::ChangesetConfig;
pub use error::{ChangesetError, ChangesetResult};
pub use orchestrator::Validation;
pub use saver::{saver_fn, Saver, SaverFn};
