//! fanout: run a function over a collection on a bounded pool of worker threads.
//!
//! Flow of one dispatch call:
//! 1. Optionally split the input into chunks ([`chunk`])
//! 2. Fill a shared [`WorkQueue`]
//! 3. Spawn `pool_size` workers that drain the queue
//! 4. Wait for completion, the deadline, or an interrupt
//! 5. Flatten per-worker results, or force-terminate and report one error

mod call;
mod chunk;
mod config;
mod error;
mod logging;
mod queue;
mod reduce;
mod runner;
mod supervisor;
mod task;
mod worker;

pub use call::{Binding, Call, CallError, Kwargs};
pub use chunk::{auto_chunk_size, chunk};
pub use config::RunConfig;
pub use error::RunError;
pub use logging::init_tracing;
pub use queue::WorkQueue;
pub use reduce::flatten;
pub use runner::{run, run_async, run_chunked, run_chunked_async};
pub use supervisor::PoolState;
pub use task::{Interrupted, Positional, Task, positional};
pub use worker::WorkerOutcome;

pub use tokio_util::sync::CancellationToken;
