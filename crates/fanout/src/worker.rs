//! Worker loop - runs on each pooled thread.
//!
//! Pops items until the queue is empty, the kill token fires, or the task
//! fails. The first failure ends the loop: items still queued are left for
//! the supervisor to discard.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::call::{Call, CallShape};
use crate::queue::WorkQueue;
use crate::task::{Interrupted, Task};

/// Terminal state of one worker.
#[derive(Debug)]
pub enum WorkerOutcome<R> {
    /// Queue drained; results in the order this worker popped items.
    Ready(Vec<R>),
    /// The task returned an error or panicked.
    Failed(anyhow::Error),
    /// Stopped by the kill signal or by a task returning [`Interrupted`].
    Killed,
}

impl<R> WorkerOutcome<R> {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
            Self::Killed => "killed",
        }
    }
}

/// Drain `queue` through `task` until empty, failed, or killed.
pub(crate) fn run_worker<T, R, F>(
    worker_id: usize,
    queue: &WorkQueue<T>,
    task: &F,
    shape: &CallShape,
    kill: &CancellationToken,
) -> WorkerOutcome<R>
where
    T: Serialize,
    F: Task<T, R> + ?Sized,
{
    let mut results = Vec::new();

    loop {
        if kill.is_cancelled() {
            tracing::debug!(worker_id, completed = results.len(), "Worker killed");
            return WorkerOutcome::Killed;
        }

        let Some(item) = queue.try_pop() else {
            tracing::debug!(worker_id, completed = results.len(), "Queue drained");
            return WorkerOutcome::Ready(results);
        };

        let call = match Call::bind(item, shape, worker_id, kill.clone()) {
            Ok(call) => call,
            Err(e) => return WorkerOutcome::Failed(e.into()),
        };

        match panic::catch_unwind(AssertUnwindSafe(|| task.call(call))) {
            Ok(Ok(result)) => results.push(result),
            Ok(Err(e)) if e.is::<Interrupted>() => {
                tracing::debug!(worker_id, "Task requested interrupt");
                return WorkerOutcome::Killed;
            }
            Ok(Err(e)) => {
                tracing::debug!(worker_id, error = %e, "Task failed");
                return WorkerOutcome::Failed(e);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(worker_id, panic = %message, "Task panicked");
                return WorkerOutcome::Failed(anyhow::anyhow!("task panicked: {message}"));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{Binding, Kwargs};

    fn positional_shape() -> CallShape {
        CallShape::default()
    }

    fn double(call: Call<i64>) -> anyhow::Result<i64> {
        Ok(call.into_item()? * 2)
    }

    #[test]
    fn drains_queue_in_pop_order() {
        let queue: WorkQueue<i64> = (1..=5).collect();
        let outcome: WorkerOutcome<i64> = run_worker(
            0,
            &queue,
            &double,
            &positional_shape(),
            &CancellationToken::new(),
        );

        match outcome {
            WorkerOutcome::Ready(results) => assert_eq!(results, vec![2, 4, 6, 8, 10]),
            other => panic!("expected ready, got {}", other.as_str()),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_queue_is_ready_with_no_results() {
        let queue: WorkQueue<i64> = WorkQueue::new();
        let outcome: WorkerOutcome<i64> = run_worker(
            0,
            &queue,
            &double,
            &positional_shape(),
            &CancellationToken::new(),
        );
        assert!(matches!(outcome, WorkerOutcome::Ready(ref r) if r.is_empty()));
    }

    #[test]
    fn first_failure_abandons_rest_of_queue() {
        let queue: WorkQueue<i64> = (1..=5).collect();
        let task = |call: Call<i64>| -> anyhow::Result<i64> {
            let n = call.into_item()?;
            anyhow::ensure!(n != 2, "bad item {n}");
            Ok(n)
        };

        let outcome: WorkerOutcome<i64> = run_worker(
            0,
            &queue,
            &task,
            &positional_shape(),
            &CancellationToken::new(),
        );

        match outcome {
            WorkerOutcome::Failed(e) => assert_eq!(e.to_string(), "bad item 2"),
            other => panic!("expected failed, got {}", other.as_str()),
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.consumed(), 2);
    }

    #[test]
    fn kill_signal_stops_before_popping() {
        let queue: WorkQueue<i64> = (1..=5).collect();
        let kill = CancellationToken::new();
        kill.cancel();

        let outcome: WorkerOutcome<i64> = run_worker(
            0,
            &queue,
            &double,
            &positional_shape(),
            &kill,
        );

        assert!(matches!(outcome, WorkerOutcome::Killed));
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn kill_between_items_stops_the_loop() {
        let queue: WorkQueue<i64> = (1..=5).collect();
        let kill = CancellationToken::new();
        let task = |call: Call<i64>| -> anyhow::Result<i64> {
            call.cancel_token().cancel();
            call.into_item().map_err(Into::into)
        };

        let outcome: WorkerOutcome<i64> = run_worker(0, &queue, &task, &positional_shape(), &kill);

        assert!(matches!(outcome, WorkerOutcome::Killed));
        assert_eq!(queue.consumed(), 1);
    }

    #[test]
    fn interrupted_marker_kills_worker() {
        let queue: WorkQueue<i64> = (1..=3).collect();
        let task = |_: Call<i64>| -> anyhow::Result<i64> { Err(Interrupted.into()) };

        let outcome: WorkerOutcome<i64> = run_worker(
            0,
            &queue,
            &task,
            &positional_shape(),
            &CancellationToken::new(),
        );
        assert!(matches!(outcome, WorkerOutcome::Killed));
    }

    #[test]
    fn panic_becomes_failure() {
        let queue: WorkQueue<i64> = (1..=3).collect();
        let task = |_: Call<i64>| -> anyhow::Result<i64> { panic!("kaboom") };

        let outcome: WorkerOutcome<i64> = run_worker(
            0,
            &queue,
            &task,
            &positional_shape(),
            &CancellationToken::new(),
        );

        match outcome {
            WorkerOutcome::Failed(e) => assert_eq!(e.to_string(), "task panicked: kaboom"),
            other => panic!("expected failed, got {}", other.as_str()),
        }
    }

    #[test]
    fn named_binding_reaches_task() {
        let queue: WorkQueue<u32> = (1..=3).collect();
        let mut kwargs = Kwargs::new();
        kwargs.insert("base".into(), 10.into());
        let shape = CallShape {
            binding: Binding::named("offset"),
            kwargs,
        };
        let task = |call: Call<u32>| -> anyhow::Result<u32> {
            Ok(call.arg::<u32>("base")? + call.arg::<u32>("offset")?)
        };

        let outcome: WorkerOutcome<u32> = run_worker(
            0,
            &queue,
            &task,
            &shape,
            &CancellationToken::new(),
        );
        assert!(matches!(outcome, WorkerOutcome::Ready(ref r) if r == &[11, 12, 13]));
    }
}
