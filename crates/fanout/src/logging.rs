//! Tracing setup for binaries and tests that embed the pool.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a stderr subscriber honoring `RUST_LOG`, `FANOUT_LOG` and `LOG_FORMAT`.
///
/// `RUST_LOG` wins when set. Otherwise `FANOUT_LOG` picks the level for this
/// crate (`debug`, `warn`, `error`; anything else is `info`). `LOG_FORMAT=json`
/// switches to JSON lines. Does nothing if a global subscriber already exists.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(format!("fanout={}", level_from(std::env::var("FANOUT_LOG").ok())))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn level_from(value: Option<String>) -> &'static str {
    match value.as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_defaults_to_info() {
        assert_eq!(level_from(None), "info");
        assert_eq!(level_from(Some("loud".into())), "info");
    }

    #[test]
    fn level_accepts_known_names() {
        assert_eq!(level_from(Some("debug".into())), "debug");
        assert_eq!(level_from(Some("warning".into())), "warn");
        assert_eq!(level_from(Some("error".into())), "error");
    }

    #[test]
    fn init_is_idempotent() {
        init_tracing();
        init_tracing();
        tracing::info!("tracing initialized twice without panicking");
    }
}
