//! Logging setup shared by the `trollbuddy` binary and embedding hosts.
//!
//! `RUST_LOG` wins when set. Otherwise only the `TrollBuddy` crates log, at
//! the configured level, so dependency chatter (sqlx, reqwest, hyper) stays
//! quiet.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events pass the default filter.
const CRATES: [&str; 3] = ["trollbuddy_cli", "trollbuddy_core", "trollbuddy_session"];

/// Filter directive enabling `level` for every `TrollBuddy` crate.
pub fn default_filter(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialise the global subscriber.
///
/// Log lines go to stderr so command output on stdout stays clean. With
/// `log_json` each event is one JSON object per line.
pub fn init_tracing(level: &str, log_json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
