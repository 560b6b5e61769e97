/// HTTP health and metrics endpoints.
///
/// Served on a separate port next to the WebSocket listener so load balancers
/// and supervisors can probe the process without speaking MCP.

use std::io;
use std::sync::Arc;

use actix_web::{
    App, HttpResponse, HttpServer, Result,
    dev::ServerHandle,
    middleware::{DefaultHeaders, Logger},
    web,
};
use tracing::info;

use crate::core::server::ServerStats;

struct HealthState {
    /// Service name reported by /health
    service: String,
}

/// Health check endpoint handler.
async fn health(state: web::Data<HealthState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": state.service
    })))
}

/// Connection and message counters since server start.
async fn metrics(stats: web::Data<ServerStats>) -> Result<HttpResponse> {
    let snapshot = stats.snapshot();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "connections_total": snapshot.connections_total,
        "connections_active": snapshot.connections_active,
        "messages_total": snapshot.messages_total,
        "status": "ok"
    })))
}

/// Start the health server in the background and return its stop handle.
///
/// # Arguments
/// * `host` - Bind address
/// * `port` - HTTP port for `/health` and `/metrics`
/// * `service` - Name reported by `/health`
/// * `stats` - Counters reported by `/metrics`
pub fn start_health_server(
    host: &str,
    port: u16,
    service: String,
    stats: Arc<ServerStats>,
) -> io::Result<ServerHandle> {
    let state = web::Data::new(HealthState { service });
    let stats = web::Data::from(stats);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(stats.clone())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("Cache-Control", "no-store")),
            )
            // %r = request line, %s = status, %Dms = duration in milliseconds
            .wrap(Logger::new("%r %s %Dms"))
            .route("/health", web::get().to(health))
            .route("/metrics", web::get().to(metrics))
    })
    .workers(1)
    .disable_signals()
    .bind((host, port))?
    .run();

    let handle = server.handle();
    tokio::spawn(server);
    info!(host, port, "Health endpoints listening");
    Ok(handle)
}
