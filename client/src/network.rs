//! WebSocket connection to the chess server

use bytes::Bytes;
use chess_shared::protocol::{ClientMessage, ProtocolError, ServerMessage};
use futures::{SinkExt, StreamExt};
use log::{debug, info};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("bad frame from server: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("connection closed by server")]
    Closed,
}

/// One protocol connection. Frames are decoded as they arrive; nothing is
/// buffered beyond what the socket holds.
pub struct ChessClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ChessClient {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (socket, _) = connect_async(url).await.map_err(ClientError::Connect)?;
        info!("Connected to {}", url);
        Ok(Self { socket })
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        debug!("Sending {:?}", message);
        self.send_raw(message.encode()).await
    }

    /// Sends bytes as-is, for frames the codec would never produce.
    pub async fn send_raw(&mut self, frame: impl Into<Bytes>) -> Result<(), ClientError> {
        self.socket.send(Message::Binary(frame.into())).await?;
        Ok(())
    }

    /// Next server message, or `None` once the server closed the connection.
    pub async fn recv(&mut self) -> Option<Result<ServerMessage, ClientError>> {
        while let Some(message) = self.socket.next().await {
            match message {
                Ok(Message::Binary(data)) => {
                    return Some(ServerMessage::decode(&data).map_err(ClientError::from))
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }

    /// Like [`recv`](Self::recv) but treats a closed connection as an error.
    pub async fn next_message(&mut self) -> Result<ServerMessage, ClientError> {
        self.recv().await.unwrap_or(Err(ClientError::Closed))
    }

    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }
}
