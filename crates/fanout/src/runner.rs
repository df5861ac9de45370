//! Public dispatch entry points.
//!
//! The blocking variants build a private current-thread runtime per call whose
//! blocking pool is capped at the configured pool size, so the workers live
//! exactly as long as the call.

use serde::Serialize;

use crate::chunk::{auto_chunk_size, chunk};
use crate::config::RunConfig;
use crate::error::RunError;
use crate::supervisor;
use crate::task::Task;

/// Apply `task` to every item on a pool of `config.pool_size` workers.
///
/// Results are grouped by worker, each group in that worker's pop order; with
/// a single worker this is input order. Blocks until done.
///
/// # Errors
///
/// [`RunError::Task`], [`RunError::Timeout`] or [`RunError::Interrupted`] when
/// the pool was force-terminated; no partial results are returned.
/// [`RunError::NestedRuntime`] when called from inside a tokio runtime.
///
/// # Example
///
/// ```
/// use fanout::{RunConfig, positional, run};
///
/// let results = run(positional(|n: i64| Ok(n.abs())), [-10, -5, 0, 5, 10], &RunConfig::new())?;
/// assert_eq!(results, vec![10, 5, 0, 5, 10]);
/// # Ok::<(), fanout::RunError>(())
/// ```
pub fn run<T, R, F>(
    task: F,
    items: impl IntoIterator<Item = T>,
    config: &RunConfig,
) -> Result<Vec<R>, RunError>
where
    T: Serialize + Send + 'static,
    R: Send + 'static,
    F: Task<T, R>,
{
    let items: Vec<T> = items.into_iter().collect();
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let runtime = build_runtime(config.effective_pool_size())?;
    runtime.block_on(supervisor::dispatch(task, items, config))
}

/// Split `items` into chunks and run `task` once per chunk.
///
/// `chunk_size` of `None` picks roughly four chunks per worker. The result
/// holds one entry per chunk; [`flatten`](crate::flatten) undoes the grouping
/// when the task returns lists.
///
/// ```
/// use fanout::{RunConfig, positional, run_chunked};
///
/// let sums = run_chunked(
///     positional(|chunk: Vec<i64>| Ok(chunk.iter().sum::<i64>())),
///     0..10,
///     Some(3),
///     &RunConfig::new(),
/// )?;
/// assert_eq!(sums, vec![3, 12, 21, 9]);
/// # Ok::<(), fanout::RunError>(())
/// ```
pub fn run_chunked<T, R, F>(
    task: F,
    items: impl IntoIterator<Item = T>,
    chunk_size: Option<usize>,
    config: &RunConfig,
) -> Result<Vec<R>, RunError>
where
    T: Serialize + Send + 'static,
    R: Send + 'static,
    F: Task<Vec<T>, R>,
{
    run(task, chunks(items, chunk_size, config), config)
}

/// [`run`] for callers already inside a tokio runtime.
///
/// Workers use the ambient runtime's blocking pool.
pub async fn run_async<T, R, F>(
    task: F,
    items: impl IntoIterator<Item = T>,
    config: &RunConfig,
) -> Result<Vec<R>, RunError>
where
    T: Serialize + Send + 'static,
    R: Send + 'static,
    F: Task<T, R>,
{
    supervisor::dispatch(task, items.into_iter().collect(), config).await
}

/// [`run_chunked`] for callers already inside a tokio runtime.
pub async fn run_chunked_async<T, R, F>(
    task: F,
    items: impl IntoIterator<Item = T>,
    chunk_size: Option<usize>,
    config: &RunConfig,
) -> Result<Vec<R>, RunError>
where
    T: Serialize + Send + 'static,
    R: Send + 'static,
    F: Task<Vec<T>, R>,
{
    supervisor::dispatch(task, chunks(items, chunk_size, config), config).await
}

fn chunks<T>(
    items: impl IntoIterator<Item = T>,
    chunk_size: Option<usize>,
    config: &RunConfig,
) -> Vec<Vec<T>> {
    let items: Vec<T> = items.into_iter().collect();
    let size = chunk_size
        .unwrap_or_else(|| auto_chunk_size(items.len(), config.effective_pool_size()));
    tracing::debug!(items = items.len(), chunk_size = size, "Chunking input");
    chunk(items, size)
}

fn build_runtime(pool_size: usize) -> Result<tokio::runtime::Runtime, RunError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(RunError::NestedRuntime);
    }

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .max_blocking_threads(pool_size)
        .thread_name("fanout-worker")
        .build()
        .map_err(RunError::Runtime)
}
