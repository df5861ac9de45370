//! Dispatch errors surfaced to the caller.

use std::time::Duration;

/// Why a dispatch call returned no results.
///
/// Every failure is all-or-nothing: the pool has been torn down and no
/// partial results survive.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The task returned an error or panicked on some item.
    #[error("{task}() stopped with error <{source}>")]
    Task {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    /// The deadline passed before every worker finished.
    #[error("{task}() stopped by timeout {timeout:?}")]
    Timeout { task: String, timeout: Duration },

    /// Interrupt observed: cancel token, Ctrl-C, or a task returning `Interrupted`.
    #[error("{task}() stopped by user")]
    Interrupted { task: String },

    #[error("failed to start worker runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("blocking dispatch called from inside an async runtime; use the async variant")]
    NestedRuntime,
}

impl RunError {
    pub fn is_task(&self) -> bool {
        matches!(self, Self::Task { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// Name of the task that was running, if the failure came from the pool.
    pub fn task_name(&self) -> Option<&str> {
        match self {
            Self::Task { task, .. } | Self::Timeout { task, .. } | Self::Interrupted { task } => {
                Some(task)
            }
            Self::Runtime(_) | Self::NestedRuntime => None,
        }
    }
}
