//! Dispatch configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::call::{Binding, CallShape, Kwargs};

const POOL_SIZE_ENV: &str = "FANOUT_POOL_SIZE";
const TIMEOUT_ENV: &str = "FANOUT_TIMEOUT";

/// Parameters for one `run`/`run_chunked` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of workers; 0 means 1.
    pub pool_size: usize,

    /// Wall-clock budget for the whole call; `None` or zero waits indefinitely.
    #[serde(with = "duration_secs")]
    pub timeout: Option<Duration>,

    pub binding: Binding,

    /// Extra keyword arguments passed to every call.
    pub kwargs: Kwargs,

    /// Task name for error messages; defaults to the task's type name.
    pub name: Option<String>,

    /// Treat Ctrl-C during the wait as an interrupt. Installs a process-wide
    /// signal listener on first use.
    pub interrupt_on_ctrl_c: bool,

    /// External interrupt source.
    #[serde(skip)]
    pub cancel_token: Option<CancellationToken>,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `FANOUT_POOL_SIZE` and `FANOUT_TIMEOUT` (seconds).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(POOL_SIZE_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.pool_size = n,
                Err(e) => tracing::warn!(var = POOL_SIZE_ENV, value = %raw, error = %e, "Ignoring invalid pool size"),
            }
        }

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<f64>().map(Duration::try_from_secs_f64) {
                Ok(Ok(timeout)) => config.timeout = Some(timeout),
                Ok(Err(e)) => tracing::warn!(var = TIMEOUT_ENV, value = %raw, error = %e, "Ignoring invalid timeout"),
                Err(e) => tracing::warn!(var = TIMEOUT_ENV, value = %raw, error = %e, "Ignoring invalid timeout"),
            }
        }

        config
    }

    pub fn with_pool_size(mut self, n: usize) -> Self {
        self.pool_size = n;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.binding = binding;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn with_ctrl_c(mut self, enabled: bool) -> Self {
        self.interrupt_on_ctrl_c = enabled;
        self
    }

    pub fn effective_pool_size(&self) -> usize {
        self.pool_size.max(1)
    }

    pub fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }

    pub(crate) fn call_shape(&self) -> CallShape {
        CallShape {
            binding: self.binding.clone(),
            kwargs: self.kwargs.clone(),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(d)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn default_is_single_worker_without_timeout() {
        let config = RunConfig::default();
        assert_eq!(config.effective_pool_size(), 1);
        assert_eq!(config.effective_timeout(), None);
        assert_eq!(config.binding, Binding::Positional);
        assert!(config.kwargs.is_empty());
        assert!(!config.interrupt_on_ctrl_c);
    }

    #[test]
    fn zero_timeout_means_no_timeout() {
        let config = RunConfig::new().with_timeout(Duration::ZERO);
        assert_eq!(config.effective_timeout(), None);
    }

    #[test]
    fn builder_sets_fields() {
        let config = RunConfig::new()
            .with_pool_size(4)
            .with_timeout(Duration::from_secs(2))
            .with_binding(Binding::named("ndigits"))
            .with_kwarg("number", 0.11111)
            .with_name("round")
            .with_ctrl_c(true);

        assert_eq!(config.effective_pool_size(), 4);
        assert_eq!(config.effective_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.name.as_deref(), Some("round"));
        assert!(config.interrupt_on_ctrl_c);

        let shape = config.call_shape();
        assert_eq!(shape.binding, Binding::named("ndigits"));
        assert_eq!(shape.kwargs["number"], 0.11111);
    }

    #[test]
    fn env_overrides_pool_size_and_timeout() {
        let config =
            RunConfig::from_lookup(lookup(&[("FANOUT_POOL_SIZE", "8"), ("FANOUT_TIMEOUT", "1.5")]));
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn env_ignores_invalid_values() {
        let config =
            RunConfig::from_lookup(lookup(&[("FANOUT_POOL_SIZE", "many"), ("FANOUT_TIMEOUT", "-3")]));
        assert_eq!(config.pool_size, 0);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn serializes_timeout_as_seconds() {
        let config = RunConfig::new()
            .with_pool_size(2)
            .with_timeout(Duration::from_millis(1500))
            .with_kwarg("ndigits", 1);

        insta::assert_json_snapshot!(config, @r#"
        {
          "pool_size": 2,
          "timeout": 1.5,
          "binding": {
            "mode": "positional"
          },
          "kwargs": {
            "ndigits": 1
          },
          "name": null,
          "interrupt_on_ctrl_c": false
        }
        "#);
    }

    #[test]
    fn deserializes_partial_config() {
        let config: RunConfig =
            serde_json::from_str(r#"{"pool_size": 3, "binding": {"mode": "named", "name": "x"}}"#)
                .unwrap();
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.binding, Binding::named("x"));
        assert_eq!(config.timeout, None);
        assert!(config.cancel_token.is_none());
    }
}
