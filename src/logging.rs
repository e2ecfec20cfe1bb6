//! Tracing subscriber setup for embedders that do not install their own.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber at `info` for this crate.
///
/// `RUST_LOG` still takes precedence for everything else. Calling this more
/// than once (or after another subscriber was installed) is a no-op.
pub fn init() {
    init_with_level("info");
}

/// Initialize the global tracing subscriber with an explicit level for this
/// crate's events.
pub fn init_with_level(level: &str) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("swarm_gateway={level}").parse() {
        filter = filter.add_directive(directive);
    }
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
