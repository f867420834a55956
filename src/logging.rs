/// Logging Module
///
/// Installs the process-wide `tracing` subscriber.
use std::str::FromStr;
use std::sync::Once;
use tracing::Level;

static INIT_ONCE: Once = Once::new();

/// Parses a level name (`error`, `warn`, `info`, `debug`, `trace`),
/// falling back to `info` for anything else.
pub fn parse_level(level: &str) -> Level {
    Level::from_str(level.trim()).unwrap_or(Level::INFO)
}

/// Installs a `tracing_subscriber::fmt` subscriber writing to stderr.
///
/// Only the first call has an effect, and a subscriber installed elsewhere
/// is left in place.
pub fn init_logging(level: &str) {
    let max_level = parse_level(level);
    INIT_ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(max_level)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
