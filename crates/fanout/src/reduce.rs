//! Result flattening.

/// Concatenate nested lists one level deep, preserving order.
pub fn flatten<I>(lists: I) -> Vec<<I::Item as IntoIterator>::Item>
where
    I: IntoIterator,
    I::Item: IntoIterator,
{
    lists.into_iter().flatten().collect()
}

/// Join per-worker result lists in worker-spawn order.
pub(crate) fn reduce<R>(per_worker: Vec<Vec<R>>) -> Vec<R> {
    for (worker_id, results) in per_worker.iter().enumerate() {
        tracing::trace!(worker_id, results = results.len(), "Collecting worker results");
    }
    flatten(per_worker)
}
