//! Serial async reduction.
//!
//! Like `Iterator::fold`, but each step is a future and the next step only
//! starts once the previous one has resolved. Steps never overlap.

use std::future::Future;

/// Folds `step` over `items` in order, starting from `seed`.
///
/// An empty input resolves to `seed` without calling `step`. The first error
/// stops the fold.
pub async fn reduce_serial<T, A, E, I, F, Fut>(items: I, seed: A, mut step: F) -> Result<A, E>
where
    I: IntoIterator<Item = T>,
    F: FnMut(A, T, usize) -> Fut,
    Fut: Future<Output = Result<A, E>>,
{
    let mut acc = seed;
    for (index, item) in items.into_iter().enumerate() {
        acc = step(acc, item, index).await?;
    }
    Ok(acc)
}

/// Folds `step` over `items` in order with no initial accumulator.
///
/// An empty input resolves to `None`. A single item is returned as the
/// result without calling `step`. Otherwise the first call receives `None`.
pub async fn reduce_serial_unseeded<T, A, E, I, F, Fut>(
    items: I,
    mut step: F,
) -> Result<Option<A>, E>
where
    I: IntoIterator<Item = T>,
    T: Into<A>,
    F: FnMut(Option<A>, T, usize) -> Fut,
    Fut: Future<Output = Result<A, E>>,
{
    let items: Vec<T> = items.into_iter().collect();
    if items.len() == 1 {
        return Ok(items.into_iter().next().map(Into::into));
    }

    let mut acc = None;
    for (index, item) in items.into_iter().enumerate() {
        acc = Some(step(acc, item, index).await?);
    }
    Ok(acc)
}
