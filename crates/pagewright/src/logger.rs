//! Logging setup for test runs.
//!
//! Every layer of the crate logs through `tracing`: waits and actions at
//! `debug`, assertions and written evidence at `info`, swallowed failures at
//! `warn`. Call [`init_logger`] once per test binary (calling it again is a
//! no-op) to see them.
//!
//! ```rust,no_run
//! use pagewright::logger::init_logger;
//!
//! init_logger("debug", false);
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a compact fmt subscriber.
///
/// `RUST_LOG` wins when set. Otherwise `level` applies to this crate and
/// everything else is limited to warnings (chromiumoxide is chatty at
/// `info`).
pub fn init_logger(level: &str, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .with_test_writer()
        .compact();

    // A second call from another test in the same binary fails harmlessly.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("warn,pagewright={level}")).unwrap_or_else(|_| EnvFilter::new("warn,pagewright=info"))
}
