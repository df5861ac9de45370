//! Call shape for a single task invocation.
//!
//! Every work item reaches the task as a [`Call`]: the item itself, bound
//! either positionally or under a parameter name, plus the fixed keyword
//! arguments supplied once per dispatch.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Keyword arguments merged into every call.
pub type Kwargs = serde_json::Map<String, serde_json::Value>;

/// How a popped item is handed to the task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "name", rename_all = "snake_case")]
pub enum Binding {
    /// Item is the positional argument (`Call::item`).
    #[default]
    Positional,
    /// Item is serialized into the keyword arguments under this name.
    Named(String),
}

impl Binding {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("missing positional argument")]
    MissingPositional,

    #[error("missing argument '{name}'")]
    MissingArgument { name: String },

    #[error("invalid argument '{name}': {source}")]
    InvalidArgument {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot bind item to argument '{name}': {source}")]
    Bind {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Fixed per-dispatch call parameters, shared by all workers.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallShape {
    pub binding: Binding,
    pub kwargs: Kwargs,
}

/// Arguments for one task invocation.
#[derive(Debug)]
pub struct Call<T> {
    item: Option<T>,
    kwargs: Kwargs,
    worker_id: usize,
    cancel: CancellationToken,
}

impl<T: Serialize> Call<T> {
    pub(crate) fn bind(
        item: T,
        shape: &CallShape,
        worker_id: usize,
        cancel: CancellationToken,
    ) -> Result<Self, CallError> {
        let mut kwargs = shape.kwargs.clone();
        let item = match &shape.binding {
            Binding::Positional => Some(item),
            Binding::Named(name) => {
                let value = serde_json::to_value(&item).map_err(|source| CallError::Bind {
                    name: name.clone(),
                    source,
                })?;
                kwargs.insert(name.clone(), value);
                None
            }
        };

        Ok(Self {
            item,
            kwargs,
            worker_id,
            cancel,
        })
    }
}

impl<T> Call<T> {
    /// Positional item, `None` under named binding.
    pub fn item(&self) -> Option<&T> {
        self.item.as_ref()
    }

    pub fn into_item(self) -> Result<T, CallError> {
        self.item.ok_or(CallError::MissingPositional)
    }

    /// Deserialize the keyword argument `name`.
    pub fn arg<D: DeserializeOwned>(&self, name: &str) -> Result<D, CallError> {
        let value = self
            .kwargs
            .get(name)
            .ok_or_else(|| CallError::MissingArgument {
                name: name.to_string(),
            })?;
        D::deserialize(value).map_err(|source| CallError::InvalidArgument {
            name: name.to_string(),
            source,
        })
    }

    /// Like [`Call::arg`], falling back to `default` when `name` is absent.
    pub fn arg_or<D: DeserializeOwned>(&self, name: &str, default: D) -> Result<D, CallError> {
        if self.kwargs.contains_key(name) {
            self.arg(name)
        } else {
            Ok(default)
        }
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// True once the pool is shutting down. Long items may poll this and bail out.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
