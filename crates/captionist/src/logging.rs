//! Logging initialization.
//!
//! Logs always go to stderr; stdout carries caption output only.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence over `verbose` when set.
pub fn init(verbose: bool, json_format: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(console::Term::stderr().features().colors_supported()),
            )
            .init();
    }
}

/// Initialize from the `[logging]` section, with command-line overrides.
pub fn init_from_config(
    config: &captionist_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let (verbose, json_format) = resolve(config, verbose_override, json_logs_override);
    init(verbose, json_format);
}

fn resolve(
    config: &captionist_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) -> (bool, bool) {
    let level = config.logging.level.to_lowercase();
    let verbose = verbose_override || level == "debug" || level == "trace";
    let json_format = json_logs_override || config.logging.format.eq_ignore_ascii_case("json");
    (verbose, json_format)
}
