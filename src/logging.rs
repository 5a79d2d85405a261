//! Log setup for the binary.  The library only emits `tracing` events and
//! never installs a subscriber.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::Uptime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

/// Checked before `RUST_LOG`.
pub const LOG_ENV: &str = "PHPANTOM_STUBS_LOG";

/// Filter from `PHPANTOM_STUBS_LOG`, then `RUST_LOG`, then `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    [LOG_ENV, EnvFilter::DEFAULT_ENV]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}

/// Install a stderr subscriber.  `verbose` raises the default level to
/// `debug`.  Calling this twice is harmless.
pub fn init(verbose: bool) {
    let layer = tracing_subscriber::fmt::layer()
        .with_timer(Uptime::default())
        .with_ansi(false)
        .with_target(false)
        .with_writer(BoxMakeWriter::new(std::io::stderr));
    let filter = env_filter(if verbose { "debug" } else { "warn" });
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_used_without_env() {
        // Skipped when the test environment sets either variable.
        if std::env::var(LOG_ENV).is_err() && std::env::var(EnvFilter::DEFAULT_ENV).is_err() {
            assert_eq!(env_filter("warn").to_string(), "warn");
        }
    }
}
