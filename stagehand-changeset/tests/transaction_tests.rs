use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use stagehand_changeset::{saver_fn, Changeset, ChangesetError, Saver};
use stagehand_model::Model;
use stagehand_validation::{ValidationOutcome, Validator, ValidatorRegistry};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn make_model(data: Value) -> Model {
    Model::from_value(data).unwrap()
}

fn required() -> Validator {
    Validator::sync_fn(|key, value, _| match value {
        Value::String(s) if !s.is_empty() => ValidationOutcome::Valid,
        _ => ValidationOutcome::invalid("required", key),
    })
}

fn unique() -> Validator {
    Validator::async_fn(|key, value, _| async move {
        tokio::task::yield_now().await;
        if value == json!("taken") {
            Ok(ValidationOutcome::invalid("unique", key))
        } else {
            Ok(ValidationOutcome::Valid)
        }
    })
}

fn user_changeset(registry: ValidatorRegistry) -> (Model, Changeset) {
    let model = make_model(json!({
        "username": "Lance",
        "email": "lance@example.com",
        "tags": ["admin"],
    }));
    let changeset = Changeset::new(model.clone(), registry);
    (model, changeset)
}

/// A saver that counts its calls and answers `accept`.
fn counting_saver(calls: &Arc<AtomicUsize>, accept: bool) -> impl Saver {
    let calls = calls.clone();
    saver_fn(move |_model| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(accept)
        }
    })
}

// ── Commit ───────────────────────────────────────────────────────

#[test]
fn commit_writes_dirty_fields_into_the_model() {
    let (model, changeset) = user_changeset(ValidatorRegistry::new().with("username", required()));

    changeset.set("username", json!("Marcus")).unwrap();
    changeset.edit("tags", |tags| tags.as_array_mut().unwrap().push(json!("ops"))).unwrap();

    assert!(changeset.commit());
    assert_eq!(model.get_str("username").as_deref(), Some("Marcus"));
    assert_eq!(model.get("tags"), Some(json!(["admin", "ops"])));
    assert_eq!(model.get_str("email").as_deref(), Some("lance@example.com"));
    assert!(!changeset.is_dirty());
}

#[test]
fn commit_requires_valid_and_dirty() {
    let (model, changeset) = user_changeset(ValidatorRegistry::new().with("username", required()));

    assert!(!changeset.commit(), "clean changeset has nothing to commit");

    changeset.set("username", json!("")).unwrap();
    assert!(!changeset.commit());
    assert_eq!(model.get_str("username").as_deref(), Some("Lance"));
    assert!(changeset.is_field_dirty("username"));
}

#[test]
fn committed_complex_field_gets_a_fresh_shadow() {
    let (model, changeset) = user_changeset(ValidatorRegistry::new());

    changeset.edit("tags", |tags| tags.as_array_mut().unwrap().push(json!("ops"))).unwrap();
    assert!(changeset.commit());

    changeset.edit("tags", |tags| tags.as_array_mut().unwrap().clear()).unwrap();
    assert_eq!(changeset.get("tags"), Some(json!([])));
    assert_eq!(model.get("tags"), Some(json!(["admin", "ops"])));
    assert!(changeset.is_field_dirty("tags"));
}

#[test]
fn committed_primitive_reads_through_again() {
    let (model, changeset) = user_changeset(ValidatorRegistry::new());

    changeset.set("username", json!("Marcus")).unwrap();
    assert!(changeset.commit());

    model.insert("username", json!("Host"));
    assert_eq!(changeset.get("username"), Some(json!("Host")));
}

// ── Reset ────────────────────────────────────────────────────────

#[test]
fn reset_discards_staged_edits() {
    let (model, changeset) = user_changeset(ValidatorRegistry::new());

    changeset.set("username", json!("Marcus")).unwrap();
    changeset.edit("tags", |tags| tags.as_array_mut().unwrap().push(json!("ops"))).unwrap();
    model.insert("tags", json!(["root"]));

    changeset.reset();

    assert!(!changeset.is_dirty());
    assert_eq!(changeset.get("username"), Some(json!("Lance")));
    assert_eq!(changeset.get("tags"), Some(json!(["root"])));
    assert_eq!(model.get("tags"), Some(json!(["root"])));
}

#[test]
fn reset_keeps_field_errors() {
    let (_model, changeset) = user_changeset(ValidatorRegistry::new().with("username", required()));

    changeset.set("username", json!("")).unwrap();
    changeset.reset();

    assert_eq!(changeset.get("username"), Some(json!("Lance")));
    assert!(changeset.error("username").is_some());
    assert!(changeset.validate(Some("username")).unwrap().settled().unwrap());
    assert!(changeset.is_valid());
}

// ── Save ─────────────────────────────────────────────────────────

#[tokio::test]
async fn save_persists_and_resets() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let (model, changeset) = user_changeset(ValidatorRegistry::new().with("username", unique()));

    changeset.set("username", json!("Marcus")).unwrap().await;
    let saved = changeset.save(&counting_saver(&calls, true)).await.unwrap();

    assert!(saved);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(model.get_str("username").as_deref(), Some("Marcus"));
    assert!(!changeset.is_dirty());
    assert!(!changeset.is_saving());
}

#[tokio::test]
async fn invalid_changeset_is_not_saved() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let (model, changeset) = user_changeset(ValidatorRegistry::new().with("username", unique()));

    // Staged without waiting; save revalidates everything itself.
    let _ = changeset.set("username", json!("taken")).unwrap();
    let saved = changeset.save(&counting_saver(&calls, true)).await.unwrap();

    assert!(!saved);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(model.get_str("username").as_deref(), Some("Lance"));
    assert!(changeset.is_field_dirty("username"));
    assert_eq!(changeset.error("username").unwrap().values["type"], json!("unique"));
    assert!(!changeset.is_saving());
}

#[tokio::test]
async fn save_runs_even_when_nothing_is_dirty() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (_model, changeset) = user_changeset(ValidatorRegistry::new());

    assert!(changeset.save(&counting_saver(&calls, true)).await.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_save_keeps_generic_errors() {
    let (model, changeset) = user_changeset(ValidatorRegistry::new());
    let handle = changeset.clone();
    let saver = saver_fn(move |_model| {
        let handle = handle.clone();
        async move {
            handle.add_generic_error("quota_exceeded");
            Ok(false)
        }
    });

    changeset.set("username", json!("Marcus")).unwrap();
    let saved = changeset.save(&saver).await.unwrap();

    assert!(!saved);
    assert_eq!(changeset.generic_errors(), vec!["quota_exceeded".to_owned()]);
    assert_eq!(model.get_str("username").as_deref(), Some("Marcus"));
    assert!(!changeset.is_saving());
}

#[tokio::test]
async fn save_clears_generic_errors_when_it_starts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (_model, changeset) = user_changeset(ValidatorRegistry::new());
    changeset.add_generic_error("stale");

    changeset.save(&counting_saver(&calls, true)).await.unwrap();
    assert_eq!(changeset.generic_error(), None);
}

#[tokio::test]
async fn saver_fault_is_returned() {
    init_tracing();
    let (_model, changeset) = user_changeset(ValidatorRegistry::new());
    let saver = saver_fn(|_model| async { Err(anyhow::anyhow!("disk full")) });

    changeset.set("username", json!("Marcus")).unwrap();
    let err = changeset.save(&saver).await.unwrap_err();

    assert!(matches!(err, ChangesetError::Save(_)));
    assert_eq!(err.to_string(), "disk full");
    assert!(!changeset.is_saving());
}

#[tokio::test]
async fn is_saving_holds_while_the_saver_runs() {
    let (_model, changeset) = user_changeset(ValidatorRegistry::new());
    let seen = Arc::new(AtomicBool::new(false));
    let saver = {
        let handle = changeset.clone();
        let seen = seen.clone();
        saver_fn(move |_model| {
            let handle = handle.clone();
            let seen = seen.clone();
            async move {
                seen.store(handle.is_saving(), Ordering::SeqCst);
                Ok(true)
            }
        })
    };

    changeset.save(&saver).await.unwrap();

    assert!(seen.load(Ordering::SeqCst));
    assert!(!changeset.is_saving());
}

#[tokio::test]
async fn dropped_save_clears_is_saving() {
    let (open, gate) = watch::channel(false);
    let (_model, changeset) = user_changeset(ValidatorRegistry::new());
    let saver = saver_fn(move |_model| {
        let mut gate = gate.clone();
        async move {
            let _ = gate.wait_for(|open| *open).await;
            Ok(true)
        }
    });

    let mut save = tokio_test::task::spawn(changeset.save(&saver));
    tokio_test::assert_pending!(save.poll());
    assert!(changeset.is_saving());

    drop(save);
    assert!(!changeset.is_saving());
    drop(open);
}

// ── Partial and merge ────────────────────────────────────────────

#[test]
fn partial_is_seeded_from_the_staged_view() {
    let (model, changeset) = user_changeset(ValidatorRegistry::new().with("username", required()));
    changeset.set("username", json!("Marcus")).unwrap();

    let partial = changeset.partial(&["username"]).unwrap();

    assert_eq!(partial.fields(), ["username".to_owned()]);
    assert_eq!(partial.get("username"), Some(json!("Marcus")));
    assert!(!partial.is_dirty());
    assert!(!partial.model().ptr_eq(&model));
    assert!(partial.registry().contains("username"));
}

#[test]
fn partial_commit_leaves_the_parent_alone() {
    let (model, changeset) = user_changeset(ValidatorRegistry::new().with("username", required()));
    changeset.set("username", json!("Marcus")).unwrap();

    let partial = changeset.partial(&["username", "tags"]).unwrap();
    partial.set("username", json!("Ann")).unwrap();
    partial.edit("tags", |tags| tags.as_array_mut().unwrap().push(json!("ops"))).unwrap();
    assert!(partial.commit());

    assert_eq!(partial.model().get_str("username").as_deref(), Some("Ann"));
    assert_eq!(changeset.get("username"), Some(json!("Marcus")));
    assert_eq!(changeset.get("tags"), Some(json!(["admin"])));
    assert_eq!(model.get_str("username").as_deref(), Some("Lance"));
}

#[test]
fn partial_runs_only_its_subset_of_validators() {
    let registry = ValidatorRegistry::new()
        .with("username", required())
        .with("email", required());
    let (_model, changeset) = user_changeset(registry);

    let partial = changeset.partial(&["username"]).unwrap();
    assert!(!partial.registry().contains("email"));

    partial.set("username", json!("")).unwrap();
    assert!(!partial.is_valid());
    assert!(changeset.is_valid());
}

#[test]
fn partial_with_unknown_field_fails() {
    let (_model, changeset) = user_changeset(ValidatorRegistry::new());

    let err = changeset.partial(&["username", "nickname"]).unwrap_err();
    assert!(matches!(err, ChangesetError::UnknownField(ref field) if field == "nickname"));
}

#[test]
fn merge_stages_and_validates_each_field() {
    let (model, changeset) = user_changeset(ValidatorRegistry::new().with("username", required()));
    let partial = changeset.partial(&["username"]).unwrap();
    partial.set("username", json!("")).unwrap();

    changeset.merge(&partial).unwrap();

    assert_eq!(changeset.get("username"), Some(json!("")));
    assert!(changeset.is_field_dirty("username"));
    assert_eq!(changeset.error("username").unwrap().values["type"], json!("required"));
    assert_eq!(model.get_str("username").as_deref(), Some("Lance"));
}

#[test]
fn merge_skips_untracked_fields() {
    let (_model, changeset) = user_changeset(ValidatorRegistry::new());
    let other = Changeset::new(
        make_model(json!({"username": "Ann", "nickname": "annie"})),
        ValidatorRegistry::new(),
    );

    changeset.merge(&other).unwrap();

    assert_eq!(changeset.get("username"), Some(json!("Ann")));
    assert!(!changeset.tracks("nickname"));
    assert_eq!(changeset.get("nickname"), None);
}

#[test]
fn merge_of_sync_fields_settles_immediately() {
    let (_model, changeset) = user_changeset(ValidatorRegistry::new().with("username", required()));
    let partial = changeset.partial(&["username"]).unwrap();
    partial.set("username", json!("Ann")).unwrap();

    let validation = changeset.merge(&partial).unwrap();
    assert_eq!(validation.settled(), Some(true));
}

#[tokio::test]
async fn merge_resolves_after_its_async_validations() {
    let (_model, changeset) = user_changeset(ValidatorRegistry::new().with("username", unique()));
    let other = Changeset::new(make_model(json!({"username": "taken"})), ValidatorRegistry::new());

    let validation = changeset.merge(&other).unwrap();
    assert!(validation.is_pending());

    assert!(!validation.await);
    assert!(!changeset.is_validating());
    assert_eq!(changeset.error("username").unwrap().values["type"], json!("unique"));
}

