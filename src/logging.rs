use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

use crate::config::LogStyle;

/// Environment variable holding an `EnvFilter` directive that replaces the
/// preset's default level.
pub const LOG_ENV: &str = "SERTERM_LOG";

/// Install the global subscriber. Diagnostics go to stderr so stdout only
/// carries device traffic.
pub fn init_tracing(style: LogStyle) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(style)));

    match style {
        LogStyle::Terse => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .without_time()
            .init(),
        LogStyle::Verbose => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_timer(UtcTime::rfc_3339())
            .init(),
    }
}

fn default_directive(style: LogStyle) -> &'static str {
    match style {
        LogStyle::Terse => "info",
        LogStyle::Verbose => "debug",
    }
}
