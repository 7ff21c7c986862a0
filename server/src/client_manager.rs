//! Live connection table for the chess server
//!
//! Each accepted WebSocket is registered here with the sending half of its
//! outbound queue. The writer task owns the receiving half; once that task
//! exits (socket closed or errored) the channel reports closed and every
//! further send to the connection is skipped. Nothing is queued for a
//! connection that is gone and nothing is retried.

use bytes::Bytes;
use log::{debug, info};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// Process-unique connection identity, assigned by the acceptor.
pub type ClientId = u32;

/// Work item for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(Bytes),
    /// Send a close frame and stop writing.
    Close,
}

/// Represents one connected client
#[derive(Debug)]
pub struct Client {
    /// Connection identifier assigned on accept
    pub id: ClientId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// When the WebSocket handshake completed
    pub connected_at: Instant,
    /// Set once a close has been requested; nothing more is read or written.
    closing: bool,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr, sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            closing: false,
            sender,
        }
    }

    /// True until a close is requested or the writer task exits.
    pub fn is_open(&self) -> bool {
        !self.closing && !self.sender.is_closed()
    }

    fn push(&self, item: Outbound) -> bool {
        self.sender.send(item).is_ok()
    }
}

/// Tracks every open connection and enforces the connection cap.
pub struct ClientManager {
    clients: HashMap<ClientId, Client>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Registers a connection. Returns false when the server is at capacity.
    pub fn add_client(
        &mut self,
        id: ClientId,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> bool {
        if self.clients.len() >= self.max_clients {
            return false;
        }

        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, sender));
        true
    }

    /// Returns true if the client was found and removed.
    pub fn remove_client(&mut self, id: ClientId) -> bool {
        match self.clients.remove(&id) {
            Some(client) => {
                info!(
                    "Client {} disconnected after {:?}",
                    client.id,
                    client.connected_at.elapsed()
                );
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn is_open(&self, id: ClientId) -> bool {
        self.clients.get(&id).is_some_and(Client::is_open)
    }

    /// Fire-and-forget delivery. Returns false when the frame was skipped
    /// because the connection is unknown or no longer writable.
    pub fn send(&self, id: ClientId, frame: Bytes) -> bool {
        match self.clients.get(&id) {
            Some(client) if client.is_open() => client.push(Outbound::Frame(frame)),
            _ => {
                debug!("Skipping frame for closed client {}", id);
                false
            }
        }
    }

    /// Asks the writer to close the socket after flushing queued frames.
    /// The client stays registered until its reader reports the disconnect,
    /// but from here on it counts as closed.
    pub fn close(&mut self, id: ClientId) {
        if let Some(client) = self.clients.get_mut(&id) {
            if !client.closing {
                client.push(Outbound::Close);
                client.closing = true;
            }
        }
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
