//! Tracing subscriber setup shared by binaries.

use tracing_subscriber::EnvFilter;

/// Default filter directive: `debug` when verbose, `info` otherwise.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Install a fmt subscriber. `RUST_LOG` wins over `verbose` when set.
///
/// Calling it again after a subscriber is installed is a no-op.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_to_debug() {
        assert_eq!(default_directive(false), "info");
        assert_eq!(default_directive(true), "debug");
    }

    #[test]
    fn repeated_init_does_not_panic() {
        init_tracing(false);
        init_tracing(true);
    }
}
