use async_trait::async_trait;
use stagehand_model::Model;
use std::future::Future;

/// Persists a model after a changeset has committed into it.
///
/// `Ok(true)` means the model was persisted, `Ok(false)` that it was rejected
/// without a fault. An `Err` is handed back to the caller of
/// [`Changeset::save`](crate::Changeset::save) unchanged.
#[async_trait]
pub trait Saver: Send + Sync {
    async fn save(&self, model: &Model) -> anyhow::Result<bool>;
}

/// A [`Saver`] backed by an async closure.
pub struct SaverFn<F>(F);

/// Wraps an async closure as a [`Saver`]. The closure receives a handle to
/// the model.
pub fn saver_fn<F, Fut>(f: F) -> SaverFn<F>
where
    F: Fn(Model) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    SaverFn(f)
}

#[async_trait]
impl<F, Fut> Saver for SaverFn<F>
where
    F: Fn(Model) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    async fn save(&self, model: &Model) -> anyhow::Result<bool> {
        (self.0)(model.clone()).await
    }
}
