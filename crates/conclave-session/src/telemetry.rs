//! Tracing subscriber setup for processes embedding the session manager.

use tracing_subscriber::EnvFilter;

/// Install a formatted stderr subscriber
///
/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. `"info"` or
/// `"conclave_orchestrator=debug"`) is used. Returns `false` when a global
/// subscriber was already installed, in which case nothing changes.
pub fn init_tracing(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        init_tracing("debug");
        assert!(!init_tracing("info"));
    }
}
