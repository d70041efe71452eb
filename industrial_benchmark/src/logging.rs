// src/logging.rs
//
// Process-wide tracing subscriber for the binaries.
//
// RUST_LOG wins when set; otherwise the verbosity count picks the level for
// this crate (0 = warn, 1 = info, 2 = debug, 3+ = trace).

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static INITIALISED: OnceLock<()> = OnceLock::new();

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "industrial_benchmark=warn",
        1 => "industrial_benchmark=info",
        2 => "industrial_benchmark=debug",
        _ => "industrial_benchmark=trace",
    }
}

/// Install the fmt subscriber. Later calls are no-ops.
pub fn init_tracing(verbosity: u8) {
    if INITIALISED.set(()).is_err() {
        return;
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    // Another subscriber may already be installed (e.g. by a test harness).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();
}
