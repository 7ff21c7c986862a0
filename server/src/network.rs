//! WebSocket transport and the single worker loop
//!
//! One acceptor task upgrades incoming TCP connections on the configured
//! path. Each connection gets a reader (forwards frames to the worker) and a
//! writer (drains the connection's outbound queue). All game state lives in
//! the worker, which handles one `NetworkEvent` at a time.

use crate::client_manager::{ClientId, Outbound};
use crate::error::ServerError;
use crate::session::SessionManager;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

/// Events sent from connection tasks to the worker loop
#[derive(Debug)]
pub enum NetworkEvent {
    Connected {
        client_id: ClientId,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Outbound>,
    },
    Frame {
        client_id: ClientId,
        data: Bytes,
    },
    Disconnected {
        client_id: ClientId,
    },
}

/// Chess server: owns the listener and the session state
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    path: String,
    session: SessionManager,

    event_tx: mpsc::UnboundedSender<NetworkEvent>,
    event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl Server {
    pub async fn new(addr: &str, path: &str, max_clients: usize) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on ws://{}{}", local_addr, path);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            path: path.to_string(),
            session: SessionManager::new(max_clients),
            event_tx,
            event_rx,
        })
    }

    /// Address actually bound, useful when started on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Spawns the task that accepts TCP connections and assigns client ids
    fn spawn_acceptor(&self, listener: TcpListener) {
        let event_tx = self.event_tx.clone();
        let path = self.path.clone();

        tokio::spawn(async move {
            let mut next_client_id: ClientId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let client_id = next_client_id;
                        next_client_id = next_client_id.wrapping_add(1);
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            client_id,
                            path.clone(),
                            event_tx.clone(),
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Main server loop. Runs until every event sender is gone.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let listener = self.listener.take().ok_or(ServerError::AlreadyRunning)?;
        self.spawn_acceptor(listener);

        info!("Server started successfully");

        while let Some(event) = self.event_rx.recv().await {
            self.handle_event(event);
        }

        info!("Server shutting down");
        Ok(())
    }

    fn handle_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Connected {
                client_id,
                addr,
                sender,
            } => {
                self.session.on_connect(client_id, addr, sender);
            }
            NetworkEvent::Frame { client_id, data } => {
                self.session.handle_frame(client_id, &data);
            }
            NetworkEvent::Disconnected { client_id } => {
                self.session.on_disconnect(client_id);
            }
        }
    }
}

/// Upgrades one TCP stream and pumps its frames until either side closes
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    client_id: ClientId,
    path: String,
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
) {
    let check_path = |request: &Request, response: Response| {
        if request.uri().path() == path {
            Ok(response)
        } else {
            debug!("Rejecting {} for path {}", addr, request.uri().path());
            let mut rejection = ErrorResponse::new(Some("not found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    let socket = match tokio_tungstenite::accept_hdr_async(stream, check_path).await {
        Ok(socket) => socket,
        Err(e) => {
            debug!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
    if event_tx
        .send(NetworkEvent::Connected {
            client_id,
            addr,
            sender: outbound_tx,
        })
        .is_err()
    {
        return;
    }

    let (mut sink, mut stream) = socket.split();

    tokio::spawn(async move {
        while let Some(item) = outbound_rx.recv().await {
            match item {
                Outbound::Frame(frame) => {
                    if let Err(e) = sink.send(Message::Binary(frame)).await {
                        debug!("Write to client {} failed: {}", client_id, e);
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Binary(data)) => {
                if event_tx
                    .send(NetworkEvent::Frame { client_id, data })
                    .is_err()
                {
                    break;
                }
            }
            Ok(Message::Text(_)) => {
                warn!("Dropping text frame from client {}", client_id);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Read from client {} failed: {}", client_id, e);
                break;
            }
        }
    }

    let _ = event_tx.send(NetworkEvent::Disconnected { client_id });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_shared::protocol::{ClientMessage, ServerMessage};
    use tokio_tungstenite::connect_async;

    async fn start() -> SocketAddr {
        let mut server = Server::new("127.0.0.1:0", "/chess", 8).await.unwrap();
        let addr = server.local_addr();
        tokio::spawn(async move { server.run().await });
        addr
    }

    #[tokio::test]
    async fn test_bind_reports_local_addr() {
        let server = Server::new("127.0.0.1:0", "/chess", 8).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert!(server.session().clients().is_empty());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let first = Server::new("127.0.0.1:0", "/chess", 8).await.unwrap();
        let taken = first.local_addr().to_string();
        match Server::new(&taken, "/chess", 8).await {
            Err(ServerError::Bind { addr, .. }) => assert_eq!(addr, taken),
            other => panic!("expected bind error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_run_without_listener_fails() {
        let mut server = Server::new("127.0.0.1:0", "/chess", 8).await.unwrap();
        server.listener.take();
        assert!(matches!(server.run().await, Err(ServerError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_wrong_path_is_rejected() {
        let addr = start().await;
        let result = connect_async(format!("ws://{}/other", addr)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_game_over_websocket() {
        let addr = start().await;
        let (mut socket, _) = connect_async(format!("ws://{}/chess", addr))
            .await
            .unwrap();

        socket
            .send(Message::Binary(ClientMessage::CreateGame.encode()))
            .await
            .unwrap();

        let reply = loop {
            match socket.next().await.unwrap().unwrap() {
                Message::Binary(data) => break ServerMessage::decode(&data).unwrap(),
                _ => continue,
            }
        };
        assert_eq!(reply, ServerMessage::GameCreated { game_id: 1 });
    }
}
