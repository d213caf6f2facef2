/// Configuration for a changeset.
#[derive(Debug, Clone)]
pub struct ChangesetConfig {
    /// Name attached to every log event from this changeset.
    pub label: String,
    /// Drop results from validation runs that were superseded by a newer
    /// edit, validation or reset of the same field. When false, the last run
    /// to finish wins even if it validated an outdated value.
    pub discard_stale_results: bool,
}

impl Default for ChangesetConfig {
    fn default() -> Self {
        Self {
            label: "changeset".to_string(),
            discard_stale_results: true,
        }
    }
}

impl ChangesetConfig {
    /// Default configuration with a custom label.
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }
}
