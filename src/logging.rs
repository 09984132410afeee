//! Tracing setup shared by the `vad` binary and embedding applications.

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber. `RUST_LOG` overrides `default_level`.
///
/// `try_init` fails with `TryInitError` only when a global subscriber is
/// already set (by an earlier call, a test harness, or a host application
/// embedding the library). That error is dropped so a second call leaves the
/// existing subscriber in place and does nothing.
pub fn init(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_keeps_first_subscriber() {
        init("info");
        init("debug");
        assert!(tracing::dispatcher::has_been_set());
    }
}
