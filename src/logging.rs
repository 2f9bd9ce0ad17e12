//! Tracing subscriber setup.
//!
//! Log level is controlled via the `LANGALLERY_LOG` environment variable,
//! using `EnvFilter` directive syntax:
//! - `LANGALLERY_LOG=debug` for verbose output (thumbnail generation, TTL rebuilds)
//! - `LANGALLERY_LOG=info` for index builds and server lifecycle (default)
//! - `LANGALLERY_LOG=warn` for failed background builds only
//!
//! Output goes to stderr so `langallery scan --json` stays pipeable.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "LANGALLERY_LOG";

/// Install the global subscriber. Later calls are ignored.
pub fn init() {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
