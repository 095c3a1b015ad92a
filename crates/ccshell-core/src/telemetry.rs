//! Diagnostics for ccshell, kept apart from the compile log.
//!
//! The compile log is user-facing output on stdout. Tracing events from the
//! orchestrator, runner and watcher (request ids, attempts, exit codes) go to
//! stderr so the two streams can be redirected independently.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the stderr subscriber for the `ccshell` binary.
///
/// `RUST_LOG` wins over `level`, which applies to the ccshell crates only;
/// dependencies stay at `warn`. With `json` each event is one JSON object
/// per line, for piping shell sessions into log collectors. Later calls are
/// no-ops, so tests may call this freely.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .json(),
            )
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("warn,ccshell_core={level},ccshell={level}")
}
