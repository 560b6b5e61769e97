/// Structured logging setup.
///
/// Everything goes to stderr so stdout stays a clean protocol stream in stdio
/// mode. The filter defaults to `info` and is overridable through `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Returns an error if one is already set.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    // actix-server and tungstenite are chatty at debug
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,actix_server=warn,tungstenite=warn"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init()
}
