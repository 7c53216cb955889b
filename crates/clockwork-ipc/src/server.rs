//! IPC server implementation

use clockwork_api::{Command, ErrorCode, ErrorInfo, Event, Request, Response};
use clockwork_util::ClientId;
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::{IpcError, IpcResult};

/// Credentials of the process on the other end of the socket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerInfo {
    pub uid: Option<u32>,
    pub pid: Option<i32>,
}

/// Message from client to server
pub enum ServerMessage {
    Request {
        client_id: ClientId,
        request: Request,
    },
    ClientConnected {
        client_id: ClientId,
        peer: PeerInfo,
    },
    ClientDisconnected {
        client_id: ClientId,
    },
}

/// IPC Server
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    clients: Arc<RwLock<HashMap<ClientId, ClientHandle>>>,
    event_tx: broadcast::Sender<Event>,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
    message_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<ServerMessage>>>>,
}

struct ClientHandle {
    peer: PeerInfo,
    response_tx: mpsc::UnboundedSender<String>,
    subscribed: bool,
}

impl IpcServer {
    /// Create a new IPC server
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let (message_tx, message_rx) = mpsc::unbounded_channel();

        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            listener: None,
            clients: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            message_tx,
            message_rx: Arc::new(Mutex::new(Some(message_rx))),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Start listening
    pub async fn start(&mut self) -> IpcResult<()> {
        // Remove a stale socket from a previous run
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        // Owner and group only: responses carry personnel data
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o660))?;

        info!(path = %self.socket_path.display(), "IPC server listening");

        self.listener = Some(listener);

        Ok(())
    }

    /// Get receiver for server messages
    pub async fn take_message_receiver(&self) -> Option<mpsc::UnboundedReceiver<ServerMessage>> {
        self.message_rx.lock().await.take()
    }

    /// Accept connections in a loop
    pub async fn run(&self) -> IpcResult<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| IpcError::ServerError("Server not started".into()))?;

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let client_id = ClientId::new();
                    let peer = peer_info(&stream);

                    info!(client_id = %client_id, uid = ?peer.uid, pid = ?peer.pid, "Client connected");

                    self.handle_client(stream, client_id, peer).await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_client(&self, stream: UnixStream, client_id: ClientId, peer: PeerInfo) {
        let (read_half, write_half) = stream.into_split();
        let (response_tx, mut response_rx) = mpsc::unbounded_channel::<String>();

        {
            let mut clients = self.clients.write().await;
            clients.insert(
                client_id.clone(),
                ClientHandle {
                    peer,
                    response_tx: response_tx.clone(),
                    subscribed: false,
                },
            );
        }

        let _ = self.message_tx.send(ServerMessage::ClientConnected {
            client_id: client_id.clone(),
            peer,
        });

        let clients = self.clients.clone();
        let message_tx = self.message_tx.clone();
        let reader_id = client_id.clone();

        tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!(client_id = %reader_id, "Client disconnected (EOF)");
                        break;
                    }
                    Ok(_) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }

                        match serde_json::from_str::<Request>(line) {
                            Ok(request) => {
                                let subscribed = match request.command {
                                    Command::SubscribeEvents => Some(true),
                                    Command::UnsubscribeEvents => Some(false),
                                    _ => None,
                                };
                                if let Some(subscribed) = subscribed {
                                    let mut clients = clients.write().await;
                                    if let Some(handle) = clients.get_mut(&reader_id) {
                                        handle.subscribed = subscribed;
                                    }
                                }

                                let _ = message_tx.send(ServerMessage::Request {
                                    client_id: reader_id.clone(),
                                    request,
                                });
                            }
                            Err(e) => {
                                warn!(client_id = %reader_id, error = %e, "Invalid request");
                                let response = Response::error(
                                    0,
                                    ErrorInfo::new(ErrorCode::InvalidRequest, e.to_string()),
                                );
                                if let Ok(json) = serde_json::to_string(&response) {
                                    let _ = response_tx.send(json);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        debug!(client_id = %reader_id, error = %e, "Read error");
                        break;
                    }
                }
            }

            // Dropping the handle closes the writer's response channel
            clients.write().await.remove(&reader_id);
            let _ = message_tx.send(ServerMessage::ClientDisconnected {
                client_id: reader_id,
            });
        });

        let mut event_rx = self.event_tx.subscribe();
        let clients_writer = self.clients.clone();
        let writer_id = client_id;

        tokio::spawn(async move {
            let mut writer = write_half;

            loop {
                let msg = tokio::select! {
                    response = response_rx.recv() => match response {
                        Some(response) => response,
                        None => break,
                    },

                    event = event_rx.recv() => match event {
                        Ok(event) => {
                            let is_subscribed = {
                                let clients = clients_writer.read().await;
                                clients.get(&writer_id).map(|h| h.subscribed).unwrap_or(false)
                            };
                            if !is_subscribed {
                                continue;
                            }
                            match serde_json::to_string(&event) {
                                Ok(json) => json,
                                Err(e) => {
                                    warn!(error = %e, "Failed to encode event");
                                    continue;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(client_id = %writer_id, skipped, "Client lagging, events dropped");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };

                let mut msg = msg;
                msg.push('\n');
                if let Err(e) = writer.write_all(msg.as_bytes()).await {
                    debug!(client_id = %writer_id, error = %e, "Write error");
                    break;
                }
            }
        });
    }

    /// Send a response to a specific client
    pub async fn send_response(&self, client_id: &ClientId, response: Response) -> IpcResult<()> {
        let json = serde_json::to_string(&response)?;

        let clients = self.clients.read().await;
        if let Some(handle) = clients.get(client_id) {
            handle
                .response_tx
                .send(json)
                .map_err(|_| IpcError::ConnectionClosed)?;
        }

        Ok(())
    }

    /// Broadcast an event to all subscribed clients
    pub fn broadcast_event(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    pub async fn peer_info(&self, client_id: &ClientId) -> Option<PeerInfo> {
        let clients = self.clients.read().await;
        clients.get(client_id).map(|h| h.peer)
    }

    /// Get connected client count
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Remove the socket file
    pub fn shutdown(&self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn peer_info(stream: &UnixStream) -> PeerInfo {
    match stream.peer_cred() {
        Ok(cred) => PeerInfo {
            uid: Some(cred.uid()),
            pid: cred.pid(),
        },
        Err(e) => {
            debug!(error = %e, "Peer credentials unavailable");
            PeerInfo::default()
        }
    }
}
