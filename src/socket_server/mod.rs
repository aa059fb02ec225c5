pub mod config;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, oneshot},
};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::{
    device_manager::{command::Command, DeviceManager},
    protocol::{
        client_command::ClientCommand,
        parse_command, serialize_response,
        server_response::{ErrorCode, ServerResponse},
    },
};
use config::SocketServerConfig;

pub struct SocketServer {
    config: SocketServerConfig,
    manager: Arc<DeviceManager>,
    shutdown_tx: Option<tokio::sync::broadcast::Sender<()>>,
    local_addr: Option<SocketAddr>,
}

impl SocketServer {
    pub fn new(config: SocketServerConfig, manager: Arc<DeviceManager>) -> Self {
        Self {
            config,
            manager,
            shutdown_tx: None,
            local_addr: None,
        }
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub async fn start(&mut self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("Cannot listen on {}", self.config.listen_addr))?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        info!("Socket server listening on: {}", local_addr);

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        let manager = self.manager.clone();
        let max_connections = self.config.max_connections;
        let max_line_length = self.config.max_line_length;

        tokio::spawn(async move {
            let active_connections = Arc::new(AtomicUsize::new(0));

            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, peer)) => {
                                let current_connections = active_connections.load(Ordering::Relaxed);
                                if current_connections >= max_connections {
                                    warn!("Maximum connections reached ({}), rejecting {}", current_connections, peer);
                                    continue;
                                }

                                let new_count = active_connections.fetch_add(1, Ordering::Relaxed) + 1;
                                let span = tracing::info_span!("client", session = %Uuid::new_v4(), %peer);
                                span.in_scope(|| debug!("New client connected. Active connections: {}", new_count));

                                let manager_clone = manager.clone();
                                let mut shutdown_rx_clone = shutdown_rx.resubscribe();
                                let active_connections_clone = active_connections.clone();

                                tokio::spawn(async move {
                                    let result = Self::handle_client(stream, manager_clone, max_line_length, &mut shutdown_rx_clone).await;
                                    if let Err(e) = result {
                                        error!("Client handler error: {}", e);
                                    }

                                    let remaining = active_connections_clone.fetch_sub(1, Ordering::Relaxed) - 1;
                                    debug!("Client disconnected. Active connections: {}", remaining);
                                }.instrument(span));
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Socket server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(());
        }

        info!("Socket server shutdown complete");
        Ok(())
    }

    async fn handle_client(
        stream: TcpStream,
        manager: Arc<DeviceManager>,
        max_line_length: usize,
        shutdown_rx: &mut tokio::sync::broadcast::Receiver<()>,
    ) -> Result<()> {
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(max_line_length));

        loop {
            tokio::select! {
                line_result = framed.next() => {
                    match line_result {
                        Some(Ok(line)) => {
                            if line.trim().is_empty() {
                                continue;
                            }
                            debug!("Received command: {}", line);

                            let response = Self::process_command(&line, &manager).await;
                            let response_json = serialize_response(&response)?;

                            if let Err(e) = framed.send(response_json).await {
                                error!("Failed to send response: {}", e);
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            error!("Error reading from client: {}", e);
                            break;
                        }
                        None => {
                            debug!("Client disconnected");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("Shutdown signal received, closing client connection");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn process_command(line: &str, manager: &DeviceManager) -> ServerResponse {
        let command = match parse_command(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                return ServerResponse::error_with_code(
                    None,
                    format!("Failed to parse command: {}", e),
                    ErrorCode::ParseError,
                );
            }
        };

        let command_id = command.id().cloned();

        match Self::execute_command(command, manager).await {
            Ok(data) => ServerResponse::success(command_id, data),
            Err(e) => {
                let code = if e.is::<oneshot::error::RecvError>()
                    || e.is::<mpsc::error::SendError<Command>>()
                {
                    ErrorCode::Unavailable
                } else {
                    ErrorCode::CommandFailed
                };
                ServerResponse::error_with_code(command_id, format!("{:#}", e), code)
            }
        }
    }

    async fn execute_command(
        command: ClientCommand,
        manager: &DeviceManager,
    ) -> Result<serde_json::Value> {
        match command {
            ClientCommand::ReadAttribute { attribute, .. } => {
                manager
                    .request(|resp| Command::ReadAttr {
                        attr: attribute,
                        resp,
                    })
                    .await
            }
            ClientCommand::WriteAttribute {
                attribute, value, ..
            } => {
                manager
                    .request(|resp| Command::WriteAttr {
                        attr: attribute,
                        value,
                        resp,
                    })
                    .await
            }
            ClientCommand::Move { target, params, .. } => {
                manager
                    .request(|resp| Command::Move {
                        target,
                        params,
                        resp,
                    })
                    .await
            }
            ClientCommand::Stop { .. } => manager.request(|resp| Command::Stop { resp }).await,
            ClientCommand::GetState { .. } => {
                manager.request(|resp| Command::GetState { resp }).await
            }
            ClientCommand::GetIdn { .. } => manager.request(|resp| Command::GetIdn { resp }).await,
            ClientCommand::GetError { .. } => {
                manager.request(|resp| Command::GetError { resp }).await
            }
            ClientCommand::AcknError { .. } => {
                manager.request(|resp| Command::AcknError { resp }).await
            }
            ClientCommand::Init { .. } => manager.request(|resp| Command::Init { resp }).await,
            ClientCommand::ListAttributes { .. } => {
                manager
                    .request(|resp| Command::ListAttributes { resp })
                    .await
            }
            ClientCommand::Ping { .. } => Ok(json!({
                "message": "pong",
                "axis": manager.axis_name(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
        }
    }
}
