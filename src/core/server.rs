/// MCP Server Implementation
///
/// Connection management for the two transports:
/// - WebSocket: one task per connection, started on accept and torn down on
///   close, read error, or server stop
/// - STDIO: newline-delimited frames on stdin/stdout
///
/// Both push the `initialize` notification first and then hand every inbound
/// text frame to the shared [`Dispatcher`].

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use crate::core::apps::{AppRegistry, ManifestAppRegistry};
use crate::core::config::ServerConfig;
use crate::core::dispatcher::Dispatcher;
use crate::core::inference::{InferenceHandle, PlaceholderEngine};
use crate::core::protocol::{self, ServerInfo};
use crate::core::registry::CapabilityRegistry;
use crate::core::resources::ResourceProvider;
use crate::tools::{ToolContext, ToolInvoker};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Frames read ahead of the one being answered, per connection.
const PENDING_FRAMES: usize = 32;

/// Counters exposed on the metrics endpoint.
#[derive(Debug, Default)]
pub struct ServerStats {
    connections_total: AtomicU64,
    connections_active: AtomicU64,
    messages_total: AtomicU64,
}

/// Counter values at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// WebSocket connections accepted since start
    pub connections_total: u64,
    /// WebSocket connections currently open
    pub connections_active: u64,
    /// Inbound frames across both transports
    pub messages_total: u64,
}

impl ServerStats {
    /// Read every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        // Relaxed: counters are independent and only read for reporting
        StatsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            messages_total: self.messages_total.load(Ordering::Relaxed),
        }
    }

    fn connection_opened(&self) -> ActiveConnection<'_> {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        ActiveConnection(self)
    }

    fn message_received(&self) {
        self.messages_total.fetch_add(1, Ordering::Relaxed);
    }
}

/// Decrements the active count when the connection task ends or is aborted.
struct ActiveConnection<'a>(&'a ServerStats);

impl Drop for ActiveConnection<'_> {
    fn drop(&mut self) {
        self.0.connections_active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// MCP server shared by both transports.
///
/// Owns the dispatcher and the connection counters; the listener itself lives
/// in the task behind a [`ServerHandle`].
pub struct McpServer {
    /// Shared by every connection task
    dispatcher: Arc<Dispatcher>,
    /// Identity announced in the initialize push
    server_info: ServerInfo,
    /// Counters reported on the metrics endpoint
    stats: Arc<ServerStats>,
}

impl McpServer {
    /// Create a server around a ready dispatcher.
    ///
    /// # Arguments
    /// * `dispatcher` - Handles every inbound frame
    /// * `server_info` - Name and version sent in the initialize push
    pub fn new(dispatcher: Dispatcher, server_info: ServerInfo) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            server_info,
            stats: Arc::default(),
        }
    }

    /// Wire the built-in collaborators described by `config`.
    pub fn from_config(config: &ServerConfig) -> io::Result<Self> {
        let apps: Arc<dyn AppRegistry> = match &config.apps_manifest {
            Some(path) => Arc::new(ManifestAppRegistry::from_file(path).map_err(io::Error::other)?),
            None => {
                warn!("APPS_MANIFEST not set; app inventory is empty");
                Arc::new(ManifestAppRegistry::default())
            }
        };
        let inference = InferenceHandle::spawn(
            PlaceholderEngine::new(config.model_dirs.clone()),
            config.inference_queue_depth,
        )?;

        let resources = ResourceProvider::new(apps.clone(), inference.clone(), config.model_name.clone());
        let tools = ToolInvoker::new(ToolContext {
            apps,
            inference,
            model_path: config.model_path.clone(),
            generate_timeout: config.generate_timeout,
        });
        let dispatcher = Dispatcher::new(Arc::new(CapabilityRegistry::builtin()), tools, resources);

        Ok(Self::new(dispatcher, config.server_info()))
    }

    /// Shared counters, for the health server.
    pub fn stats(&self) -> Arc<ServerStats> {
        self.stats.clone()
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Bind the WebSocket listener and start accepting connections.
    ///
    /// Port 0 binds an ephemeral port; see [`ServerHandle::local_addr`].
    pub async fn start_server(&self, addr: SocketAddr) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let init_frame: Arc<str> = protocol::initialize_frame(&self.server_info)
            .map_err(io::Error::other)?
            .into();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(accept_loop(
            listener,
            self.dispatcher.clone(),
            init_frame,
            self.stats.clone(),
            shutdown_rx,
        ));

        let registry = self.dispatcher.registry();
        info!(
            %local_addr,
            name = %self.server_info.name,
            tools = registry.tools().len(),
            resources = registry.resources().len(),
            "MCP Server started"
        );
        Ok(ServerHandle {
            local_addr,
            shutdown,
            task,
        })
    }

    /// Serve MCP over stdin/stdout until stdin closes.
    pub async fn run_stdio(&self) -> io::Result<()> {
        info!(name = %self.server_info.name, "MCP Server starting (STDIO mode)");
        self.serve_lines(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Line-delimited transport over any reader/writer pair.
    pub async fn serve_lines<R, W>(&self, reader: R, writer: W) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        // 8KB buffers balance memory usage with I/O efficiency
        let mut lines = BufReader::with_capacity(8192, reader).lines();
        let mut writer = BufWriter::with_capacity(8192, writer);

        let init_frame = protocol::initialize_frame(&self.server_info).map_err(io::Error::other)?;
        write_line(&mut writer, &init_frame).await?;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            self.stats.message_received();
            if let Some(reply) = self.dispatcher.handle_frame(&line).await {
                write_line(&mut writer, &reply).await?;
            }
        }

        debug!("STDIO input closed");
        Ok(())
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    // Flush after each frame for low latency
    writer.flush().await
}

/// Running WebSocket listener. Dropping the handle also stops the server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address actually bound, including the port picked for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Close the listener and every open connection, and wait until all
    /// connection tasks have finished.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Accept loop ended abnormally");
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    init_frame: Arc<str>,
    stats: Arc<ServerStats>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        dispatcher.clone(),
                        init_frame.clone(),
                        stats.clone(),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    let open = connections.len();
    connections.shutdown().await;
    info!(closed_connections = open, "MCP Server stopped");
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    init_frame: Arc<str>,
    stats: Arc<ServerStats>,
) {
    let _active = stats.connection_opened();

    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    info!(%peer, "New MCP connection");

    let (mut sink, source) = ws.split();
    if let Err(e) = sink.send(Message::Text(init_frame.to_string())).await {
        warn!(%peer, error = %e, "Failed to send initialize");
        return;
    }

    // Reading continues while a slow request is in flight so a close is seen
    // promptly; requests themselves are answered in arrival order.
    let (frames_tx, frames_rx) = mpsc::channel::<String>(PENDING_FRAMES);
    let reader = forward_frames(source, frames_tx, peer);

    tokio::select! {
        _ = reader => {}
        _ = respond(frames_rx, &mut sink, &dispatcher, &stats, peer) => {}
    }

    // Dropping the responder above cancels any in-flight invocation.
    let _ = sink.close().await;
    info!(%peer, "MCP connection closed");
}

/// Feed text frames to the responder until the client closes or the socket
/// fails. Waiting on a full queue stops reading, which pushes back on the client.
async fn forward_frames<S>(mut source: S, frames: mpsc::Sender<String>, peer: SocketAddr)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if frames.send(text).await.is_err() {
                    break;
                }
            }
            Ok(Message::Binary(bytes)) => {
                debug!(%peer, len = bytes.len(), "Ignoring binary frame");
            }
            Ok(Message::Close(frame)) => {
                debug!(%peer, ?frame, "Close frame received");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(%peer, error = %e, "WebSocket read failed");
                break;
            }
        }
    }
}

async fn respond(
    mut frames: mpsc::Receiver<String>,
    sink: &mut WsSink,
    dispatcher: &Dispatcher,
    stats: &ServerStats,
    peer: SocketAddr,
) {
    while let Some(frame) = frames.recv().await {
        debug!(%peer, len = frame.len(), "Received MCP message");
        stats.message_received();

        let Some(reply) = dispatcher.handle_frame(&frame).await else {
            continue;
        };
        if let Err(e) = sink.send(Message::Text(reply)).await {
            warn!(%peer, error = %e, "WebSocket write failed");
            break;
        }
    }
}
