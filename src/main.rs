/// CoreMind MCP Server Entry Point
///
/// Reads configuration from environment variables, starts the selected
/// transports and runs until Ctrl-C (or, in STDIO-only mode, until stdin
/// closes).
///
/// Environment Variables:
/// - SERVER_NAME: Name of the server (default: "CoreMind MCP Server")
/// - SERVER_VERSION: Version string (default: "1.0.0")
/// - MCP_TRANSPORT_MODE: "websocket", "stdio", or "both" (default: "websocket")
/// - HOST: Bind address for WebSocket mode (default: "0.0.0.0")
/// - PORT: WebSocket port (default: 8765)
/// - HEALTH_PORT: Port for /health and /metrics (default: disabled)
/// - WORKER_THREADS: Runtime worker threads (default: CPU count, max 16)
/// - MODEL_NAME, MODEL_PATH, MODEL_DIR: Model reported and loaded
/// - GENERATE_TIMEOUT_SECS: Timeout for generate_response (default: 30)
/// - INFERENCE_QUEUE_DEPTH: Pending engine commands before rejecting (default: 8)
/// - APPS_MANIFEST: JSON file listing installed apps
/// - RUST_LOG: Log filter (default: "info")

use std::process::ExitCode;

use coremind_mcp::core::config::{ServerConfig, TransportMode};
use coremind_mcp::core::{health, logging};
use coremind_mcp::McpServer;
use tracing::{error, info};

fn main() -> ExitCode {
    if let Err(e) = logging::try_init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to build runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> std::io::Result<()> {
    let server = McpServer::from_config(&config)?;

    let health = match config.health_port {
        Some(port) => Some(health::start_health_server(
            &config.host,
            port,
            server.server_info().name.clone(),
            server.stats(),
        )?),
        None => None,
    };

    let result = match config.transport {
        TransportMode::Stdio => server.run_stdio().await,
        TransportMode::WebSocket => {
            let addr = config.websocket_addr().map_err(std::io::Error::other)?;
            let handle = server.start_server(addr).await?;
            tokio::signal::ctrl_c().await?;
            info!("Shutdown requested");
            handle.stop().await;
            Ok(())
        }
        TransportMode::Both => {
            // STDIO ends when stdin closes; WebSocket keeps serving until Ctrl-C
            let addr = config.websocket_addr().map_err(std::io::Error::other)?;
            let handle = server.start_server(addr).await?;
            let stdio = server.run_stdio();
            tokio::pin!(stdio);
            let mut stdio_done = false;
            loop {
                tokio::select! {
                    res = &mut stdio, if !stdio_done => {
                        stdio_done = true;
                        if let Err(e) = res {
                            error!(error = %e, "STDIO server error");
                        }
                    }
                    signal = tokio::signal::ctrl_c() => {
                        signal?;
                        info!("Shutdown requested");
                        break;
                    }
                }
            }
            handle.stop().await;
            Ok(())
        }
    };

    if let Some(health) = health {
        health.stop(true).await;
    }
    result
}
