//! Task abstraction: the user-supplied function run by workers.

use std::marker::PhantomData;

use crate::call::Call;

/// A function applied to every work item.
///
/// Implemented for any `Fn(Call<T>) -> anyhow::Result<R>` closure; use
/// [`positional`] for functions that only take the item.
pub trait Task<T, R>: Send + Sync + 'static {
    fn call(&self, call: Call<T>) -> anyhow::Result<R>;

    /// Name used in error messages.
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }
}

impl<T, R, F> Task<T, R> for F
where
    F: Fn(Call<T>) -> anyhow::Result<R> + Send + Sync + 'static,
{
    fn call(&self, call: Call<T>) -> anyhow::Result<R> {
        self(call)
    }
}

/// Task wrapper for functions taking the item directly.
pub struct Positional<F, T> {
    f: F,
    _item: PhantomData<fn(T)>,
}

/// Adapt `Fn(T) -> anyhow::Result<R>` into a [`Task`].
///
/// Extra keyword arguments are not visible to the wrapped function, and the
/// call fails if the item was bound by name.
pub fn positional<T, R, F>(f: F) -> Positional<F, T>
where
    F: Fn(T) -> anyhow::Result<R>,
{
    Positional {
        f,
        _item: PhantomData,
    }
}

impl<T, R, F> Task<T, R> for Positional<F, T>
where
    T: 'static,
    F: Fn(T) -> anyhow::Result<R> + Send + Sync + 'static,
{
    fn call(&self, call: Call<T>) -> anyhow::Result<R> {
        (self.f)(call.into_item()?)
    }

    fn name(&self) -> String {
        short_type_name(std::any::type_name::<F>())
    }
}

/// Marker error: return it from a task to interrupt the whole dispatch.
///
/// The worker stops as `Killed` and the call fails with
/// [`RunError::Interrupted`](crate::RunError::Interrupted) rather than a task error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("task interrupted")]
pub struct Interrupted;

// `my_crate::module::square` -> `square`; closures keep their enclosing fn.
fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    let base = base.trim_end_matches("::{{closure}}");
    base.rsplit("::").next().unwrap_or(base).to_string()
}
