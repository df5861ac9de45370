//! Pool supervisor - owns the worker pool for one dispatch call.
//!
//! Flow:
//! 1. Fill the queue, spawn `pool_size` blocking workers against it
//! 2. Wait for worker completions, the deadline, or an interrupt
//! 3. All workers ready: join results in spawn order
//! 4. Anything else: fire the kill token, discard the queue, join every
//!    worker, report exactly one error
//!
//! Workers are joined on every path; nothing outlives the call.

use std::future::{Future, pending};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RunConfig;
use crate::error::RunError;
use crate::queue::WorkQueue;
use crate::reduce::reduce;
use crate::task::Task;
use crate::worker::{self, WorkerOutcome};

/// Pool-wide lifecycle flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    Running,
    TimedOut,
    Interrupted,
    Faulted,
    Closed,
}

impl PoolState {
    /// True once no new work may start.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::TimedOut => "timed_out",
            Self::Interrupted => "interrupted",
            Self::Faulted => "faulted",
            Self::Closed => "closed",
        }
    }

    fn can_transition_to(&self, next: PoolState) -> bool {
        match self {
            Self::Running => next != Self::Running,
            Self::TimedOut | Self::Interrupted | Self::Faulted => next == Self::Closed,
            Self::Closed => false,
        }
    }
}

/// Why the pool is being force-terminated.
#[derive(Debug)]
enum Shutdown {
    TimedOut,
    Interrupted,
    Faulted(anyhow::Error),
}

impl Shutdown {
    fn state(&self) -> PoolState {
        match self {
            Self::TimedOut => PoolState::TimedOut,
            Self::Interrupted => PoolState::Interrupted,
            Self::Faulted(_) => PoolState::Faulted,
        }
    }

    fn into_error(self, task: String, timeout: Option<Duration>) -> RunError {
        match self {
            Self::TimedOut => RunError::Timeout {
                task,
                timeout: timeout.unwrap_or_default(),
            },
            Self::Interrupted => RunError::Interrupted { task },
            Self::Faulted(source) => RunError::Task { task, source },
        }
    }
}

/// Run `task` over `items` on a fresh pool and reduce the results.
pub(crate) async fn dispatch<T, R, F>(
    task: F,
    items: Vec<T>,
    config: &RunConfig,
) -> Result<Vec<R>, RunError>
where
    T: Serialize + Send + 'static,
    R: Send + 'static,
    F: Task<T, R>,
{
    if items.is_empty() {
        tracing::debug!("No work items, skipping pool");
        return Ok(Vec::new());
    }

    let task_name = config.name.clone().unwrap_or_else(|| task.name());
    let span = tracing::info_span!("dispatch", id = %Uuid::new_v4(), task = %task_name);

    PoolSupervisor::new(task, task_name, config)
        .run(items)
        .instrument(span)
        .await
}

struct PoolSupervisor<'a, F> {
    task: Arc<F>,
    task_name: String,
    config: &'a RunConfig,
    state: PoolState,
}

impl<'a, F> PoolSupervisor<'a, F> {
    fn new(task: F, task_name: String, config: &'a RunConfig) -> Self {
        Self {
            task: Arc::new(task),
            task_name,
            config,
            state: PoolState::Running,
        }
    }

    fn transition(&mut self, next: PoolState) {
        if !self.state.can_transition_to(next) {
            tracing::error!(
                from = self.state.as_str(),
                to = next.as_str(),
                "Invalid pool state transition"
            );
            return;
        }
        tracing::debug!(
            from = self.state.as_str(),
            to = next.as_str(),
            "Pool state transition"
        );
        self.state = next;
    }

    async fn run<T, R>(mut self, items: Vec<T>) -> Result<Vec<R>, RunError>
    where
        T: Serialize + Send + 'static,
        R: Send + 'static,
        F: Task<T, R>,
    {
        let pool_size = self.config.effective_pool_size();
        let timeout = self.config.effective_timeout();
        let queue: Arc<WorkQueue<T>> = Arc::new(items.into_iter().collect());
        let shape = Arc::new(self.config.call_shape());
        let kill = match &self.config.cancel_token {
            Some(token) => token.child_token(),
            None => CancellationToken::new(),
        };
        let started = Instant::now();

        tracing::info!(items = queue.len(), pool_size, ?timeout, "Dispatching work");

        let mut running: FuturesUnordered<_> = (0..pool_size)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let task = Arc::clone(&self.task);
                let shape = Arc::clone(&shape);
                let kill = kill.clone();
                let span = tracing::debug_span!("worker", worker_id);

                let handle = tokio::task::spawn_blocking(move || {
                    let _entered = span.entered();
                    worker::run_worker::<T, R, F>(worker_id, &queue, task.as_ref(), &shape, &kill)
                });
                async move { (worker_id, handle.await) }
            })
            .collect();

        let deadline = optional(timeout.map(tokio::time::sleep));
        let interrupt = optional(self.config.cancel_token.clone().map(|token| async move {
            token.cancelled().await;
        }));
        let ctrl_c = optional(self.config.interrupt_on_ctrl_c.then(wait_for_ctrl_c));
        tokio::pin!(deadline, interrupt, ctrl_c);

        let mut ready: Vec<Option<Vec<R>>> = (0..pool_size).map(|_| None).collect();

        let shutdown = loop {
            tokio::select! {
                biased;

                joined = running.next() => match joined {
                    None => break None,
                    Some((worker_id, Ok(WorkerOutcome::Ready(results)))) => {
                        tracing::debug!(worker_id, results = results.len(), "Worker ready");
                        ready[worker_id] = Some(results);
                    }
                    Some((worker_id, Ok(WorkerOutcome::Failed(e)))) => {
                        tracing::warn!(worker_id, error = %e, "Worker failed");
                        break Some(Shutdown::Faulted(e));
                    }
                    Some((worker_id, Ok(WorkerOutcome::Killed))) => {
                        tracing::info!(worker_id, "Worker interrupted");
                        break Some(Shutdown::Interrupted);
                    }
                    Some((worker_id, Err(e))) => {
                        tracing::error!(worker_id, error = %e, "Worker did not complete");
                        let source = anyhow::anyhow!("worker {worker_id} did not complete: {e}");
                        break Some(Shutdown::Faulted(source));
                    }
                },
                _ = &mut interrupt => {
                    tracing::info!("Cancellation requested");
                    break Some(Shutdown::Interrupted);
                }
                _ = &mut ctrl_c => {
                    tracing::info!("Ctrl-C received");
                    break Some(Shutdown::Interrupted);
                }
                _ = &mut deadline => {
                    tracing::warn!(?timeout, "Deadline exceeded");
                    break Some(Shutdown::TimedOut);
                }
            }
        };

        let Some(shutdown) = shutdown else {
            // Every worker has returned and been joined; the queue is drained.
            self.transition(PoolState::Closed);
            let per_worker = ready.into_iter().map(Option::unwrap_or_default).collect();
            let results = reduce(per_worker);
            tracing::info!(results = results.len(), elapsed = ?started.elapsed(), "Dispatch completed");
            return Ok(results);
        };

        self.transition(shutdown.state());
        kill.cancel();
        let discarded = queue.abandon();

        // In-flight items run to completion unless the task polls its cancel token.
        while let Some((worker_id, joined)) = running.next().await {
            let outcome = match &joined {
                Ok(outcome) => outcome.as_str(),
                Err(_) => "lost",
            };
            tracing::trace!(worker_id, outcome, "Worker joined after shutdown");
        }

        self.transition(PoolState::Closed);
        tracing::warn!(
            reason = shutdown.state().as_str(),
            discarded,
            elapsed = ?started.elapsed(),
            "Worker pool force-terminated"
        );
        Err(shutdown.into_error(self.task_name, timeout))
    }
}

/// A future that never resolves when `fut` is `None`.
fn optional<Fut: Future>(fut: Option<Fut>) -> impl Future<Output = Fut::Output> {
    async move {
        match fut {
            Some(fut) => fut.await,
            None => pending().await,
        }
    }
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        pending::<()>().await;
    }
}
