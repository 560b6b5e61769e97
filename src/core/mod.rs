/// Core Server Framework Module
///
/// - protocol.rs: JSON-RPC 2.0 / MCP wire types
/// - registry.rs: catalog of advertised tools and resources
/// - dispatcher.rs: routes one inbound frame to one reply
/// - server.rs: WebSocket and STDIO connection management
/// - health.rs: HTTP health and metrics endpoints
/// - resources.rs: resource reads
/// - inference.rs, model_file.rs: inference engine seam and model file checks
/// - apps.rs: app registry seam
/// - config.rs, logging.rs: environment configuration and log setup

pub mod apps;
pub mod config;
pub mod dispatcher;
pub mod health;
pub mod inference;
pub mod logging;
pub mod model_file;
pub mod protocol;
pub mod registry;
pub mod resources;
pub mod server;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
