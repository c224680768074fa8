//! Best-effort batch application: every item is processed, every outcome is
//! kept, and a failing item never stops the ones after it.

use std::future::Future;

/// Outcome of applying an operation to one item.
#[derive(Debug)]
pub struct Settled<K, T, E> {
    pub key: K,
    pub outcome: Result<T, E>,
}

impl<K, T, E> Settled<K, T, E> {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Applies `op` to each item in order and collects one `Settled` per item.
pub async fn settle_each<I, K, T, E, F, Fut>(
    items: I,
    key_of: impl Fn(&I::Item) -> K,
    mut op: F,
) -> Vec<Settled<K, T, E>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut settled = Vec::new();
    for item in items {
        let key = key_of(&item);
        let outcome = op(item).await;
        settled.push(Settled { key, outcome });
    }
    settled
}
