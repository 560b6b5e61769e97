/// CoreMind MCP server library.
///
/// Exposes on-device capabilities (app launching, app inventory, local AI
/// inference) to an orchestrating client over JSON-RPC 2.0 on WebSocket, the
/// Model Context Protocol pattern.

pub mod core;
pub mod tools;

pub use crate::core::config::ServerConfig;
pub use crate::core::server::{McpServer, ServerHandle};
