use crate::outcome::ValidationOutcome;
use crate::reduce::reduce_serial;
use crate::registry::ValidatorRegistry;
use serde_json::Value;
use stagehand_model::Record;
use std::collections::BTreeMap;
use tracing::debug;

/// Validates every field of `record` against `registry`, one field at a time.
///
/// Each field's validators run in registration order and the field stops at
/// its first failure. The result maps each field that has validators to its
/// last outcome. An execution fault from any validator aborts the batch.
pub async fn run_validations(
    record: &Record,
    registry: &ValidatorRegistry,
) -> anyhow::Result<BTreeMap<String, ValidationOutcome>> {
    let keys: Vec<String> = record.keys().cloned().collect();

    reduce_serial(keys, BTreeMap::new(), |mut results, key, _| async move {
        let Some(validators) = registry.get(&key) else {
            return Ok::<_, anyhow::Error>(results);
        };
        let value = record.get(&key).unwrap_or(&Value::Null);

        for validator in validators.iter() {
            let outcome = validator.run(&key, value, record).await?;
            let failed = !outcome.is_valid();
            results.insert(key.clone(), outcome);
            if failed {
                debug!(field = %key, "Batch validation failed");
                break;
            }
        }

        Ok::<_, anyhow::Error>(results)
    })
    .await
}
