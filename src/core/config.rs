/// Server Configuration
///
/// All settings come from environment variables with defaults. Parsing is
/// done over a key lookup function so it can be exercised without touching
/// the process environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::protocol::ServerInfo;

/// Server name reported in the initialize push
pub const DEFAULT_SERVER_NAME: &str = "CoreMind MCP Server";
/// Server version reported in the initialize push
pub const DEFAULT_SERVER_VERSION: &str = "1.0.0";
/// WebSocket listening port
pub const DEFAULT_PORT: u16 = 8765;
/// Model name reported by the model status resource
pub const DEFAULT_MODEL_NAME: &str = "Gemma 3-1B IT";
/// Model file handed to the inference engine
pub const DEFAULT_MODEL_FILE: &str = "gemma3-1b-it-int4.task";

/// A configuration value that is present but unusable.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which transports the binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// WebSocket listener only (default)
    WebSocket,
    /// Newline-delimited frames on stdin/stdout only
    Stdio,
    /// Both transports, sharing one dispatcher
    Both,
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "websocket" | "ws" => Ok(TransportMode::WebSocket),
            "stdio" => Ok(TransportMode::Stdio),
            "both" => Ok(TransportMode::Both),
            other => Err(format!("expected 'websocket', 'stdio' or 'both', got '{}'", other)),
        }
    }
}

/// Settings read once at startup.
///
/// See the binary's documentation for the environment variable behind each
/// field.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Server name as reported in the initialize push
    pub server_name: String,
    /// Server version string as reported in the initialize push
    pub server_version: String,
    /// Transports to run
    pub transport: TransportMode,
    /// Bind address for the WebSocket listener (and health server)
    pub host: String,
    /// WebSocket listening port; 0 picks an ephemeral port
    pub port: u16,
    /// HTTP health/metrics port; disabled when `None`.
    pub health_port: Option<u16>,
    /// Tokio worker threads
    pub worker_threads: usize,
    /// Display name reported by the model status resource
    pub model_name: String,
    /// Identifier handed to the inference engine's load operation.
    pub model_path: String,
    /// Directories searched, in order, when `model_path` is not itself a file.
    pub model_dirs: Vec<PathBuf>,
    /// Upper bound on a single `generate_response` call
    pub generate_timeout: Duration,
    /// Engine commands that may wait before new ones are rejected as busy
    pub inference_queue_depth: usize,
    /// JSON manifest of installed apps; the inventory is empty when `None`
    pub apps_manifest: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unset keys take their defaults; set but malformed keys are an error.
    ///
    /// # Arguments
    /// * `lookup` - Returns the raw value for an environment variable name
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let transport = parse_value("MCP_TRANSPORT_MODE", &get("MCP_TRANSPORT_MODE", "websocket"))?;
        let port = parse_value("PORT", &get("PORT", &DEFAULT_PORT.to_string()))?;
        let health_port = lookup("HEALTH_PORT")
            .map(|raw| parse_value("HEALTH_PORT", &raw))
            .transpose()?;

        // Defaults to CPU count but capped at 16
        let worker_threads = match lookup("WORKER_THREADS") {
            Some(raw) => parse_value::<usize>("WORKER_THREADS", &raw)?.max(1),
            None => num_cpus::get().clamp(1, 16),
        };

        let generate_timeout = Duration::from_secs(parse_value(
            "GENERATE_TIMEOUT_SECS",
            &get("GENERATE_TIMEOUT_SECS", "30"),
        )?);
        let inference_queue_depth: usize =
            parse_value("INFERENCE_QUEUE_DEPTH", &get("INFERENCE_QUEUE_DEPTH", "8"))?;
        if inference_queue_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "INFERENCE_QUEUE_DEPTH",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let primary_model_dir = lookup("MODEL_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::data_dir().map(|d| d.join("coremind").join("models")));
        let model_dirs = primary_model_dir
            .into_iter()
            .chain(std::iter::once(PathBuf::from("models")))
            .collect();

        Ok(ServerConfig {
            server_name: get("SERVER_NAME", DEFAULT_SERVER_NAME),
            server_version: get("SERVER_VERSION", DEFAULT_SERVER_VERSION),
            transport,
            host: get("HOST", "0.0.0.0"),
            port,
            health_port,
            worker_threads,
            model_name: get("MODEL_NAME", DEFAULT_MODEL_NAME),
            model_path: get("MODEL_PATH", DEFAULT_MODEL_FILE),
            model_dirs,
            generate_timeout,
            inference_queue_depth,
            apps_manifest: lookup("APPS_MANIFEST").map(PathBuf::from),
        })
    }

    /// Identity announced to clients.
    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: self.server_name.clone(),
            version: self.server_version.clone(),
        }
    }

    /// Parsed `HOST:PORT` for the WebSocket listener.
    pub fn websocket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        parse_value("HOST", &raw)
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
