//! Message dispatch and broadcast fan-out
//!
//! `SessionManager` is the only owner of server state. The network worker
//! hands it one event at a time and every handler runs to completion before
//! the next event is looked at, so a game is never mutated by two messages
//! at once.

use crate::client_manager::{ClientId, ClientManager, Outbound};
use crate::registry::{GameRegistry, JoinOutcome};
use crate::voice::VoiceRelay;
use bytes::Bytes;
use chess_shared::protocol::{ClientMessage, ServerMessage, VoiceSignal};
use chess_shared::{JoinError, Move, MoveStatus, Seat};
use log::{debug, info, warn};
use std::net::SocketAddr;
use tokio::sync::mpsc;

pub struct SessionManager {
    clients: ClientManager,
    registry: GameRegistry,
    voice: VoiceRelay,
}

impl SessionManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: ClientManager::new(max_clients),
            registry: GameRegistry::new(),
            voice: VoiceRelay::new(),
        }
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    pub fn voice(&self) -> &VoiceRelay {
        &self.voice
    }

    /// Registers a new connection, closing it straight away when the server
    /// is full.
    pub fn on_connect(
        &mut self,
        client: ClientId,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> bool {
        if self.clients.add_client(client, addr, sender.clone()) {
            return true;
        }
        warn!("Server full, closing connection {} from {}", client, addr);
        let _ = sender.send(Outbound::Close);
        false
    }

    /// Decodes and handles one inbound frame. Malformed frames are dropped
    /// and the connection stays open.
    pub fn handle_frame(&mut self, client: ClientId, frame: &[u8]) {
        if !self.clients.is_open(client) {
            debug!("Ignoring frame from closed or unregistered client {}", client);
            return;
        }

        let message = match ClientMessage::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Malformed frame from client {}: {}", client, e);
                return;
            }
        };

        match message {
            ClientMessage::JoinGame {
                game_id,
                requested_seat,
            } => self.handle_join(client, game_id, requested_seat),
            ClientMessage::MovePiece { game_id, mv } => self.handle_move(client, game_id, mv),
            ClientMessage::Surrender { game_id, seat } => {
                self.handle_surrender(client, game_id, seat)
            }
            ClientMessage::ResetGame { game_id } => self.handle_reset(client, game_id),
            ClientMessage::CreateGame => self.handle_create(client),
            ClientMessage::ListGames => self.handle_list(client),
            ClientMessage::Voice(signal) => self.handle_voice(client, signal),
        }
    }

    /// Tears down everything the connection was part of.
    pub fn on_disconnect(&mut self, client: ClientId) {
        self.voice.on_disconnect(client);
        for departure in self.registry.disconnect(client) {
            if departure.forfeited {
                self.broadcast_state(departure.game_id);
            }
        }
        self.clients.remove_client(client);
        debug!(
            "Client {} torn down: {} games, {} voice sessions remain",
            client,
            self.registry.game_count(),
            self.voice.session_count()
        );
    }

    fn handle_create(&mut self, client: ClientId) {
        let game_id = self.registry.create_game();
        self.send(client, &ServerMessage::GameCreated { game_id });
    }

    fn handle_list(&mut self, client: ClientId) {
        let games = self.registry.list_available();
        debug!("Client {} listed {} open games", client, games.len());
        self.send(client, &ServerMessage::GameList(games));
    }

    fn handle_join(&mut self, client: ClientId, game_id: u32, requested: Option<Seat>) {
        match self.registry.join(client, game_id, requested) {
            JoinOutcome::AlreadySeated(seat) | JoinOutcome::Seated(seat) => {
                if let Some(table) = self.registry.table(game_id) {
                    let state = ServerMessage::GameState(table.game.snapshot(Some(seat)));
                    self.send(client, &state);
                }
            }
            JoinOutcome::Full => {
                self.send(
                    client,
                    &ServerMessage::JoinRejected {
                        game_id,
                        reason: JoinError::GameFull,
                    },
                );
                self.clients.close(client);
            }
        }
    }

    fn handle_move(&mut self, client: ClientId, game_id: u32, mv: Move) {
        let Some(table) = self.registry.table_mut(game_id) else {
            warn!("Client {} moved in unknown game {}", client, game_id);
            return;
        };

        let status = match table.game.apply_move(mv) {
            Ok(()) => {
                info!(
                    "Game {}: client {} moved {} -> {}",
                    game_id, client, mv.from, mv.to
                );
                MoveStatus::Ok
            }
            Err(e) => {
                info!("Game {}: client {} move rejected: {}", game_id, client, e);
                e.status()
            }
        };

        let result = ServerMessage::MoveResult {
            game_id,
            mv,
            status,
        }
        .encode();
        self.broadcast(game_id, result);

        if status == MoveStatus::Ok {
            self.broadcast_state(game_id);
        }
    }

    fn handle_surrender(&mut self, client: ClientId, game_id: u32, seat: Seat) {
        let Some(table) = self.registry.table_mut(game_id) else {
            warn!("Client {} surrendered in unknown game {}", client, game_id);
            return;
        };

        match table.game.surrender(seat) {
            Ok(()) => self.broadcast_state(game_id),
            Err(e) => info!(
                "Game {}: surrender from client {} ignored: {}",
                game_id, client, e
            ),
        }
    }

    fn handle_reset(&mut self, client: ClientId, game_id: u32) {
        let Some(table) = self.registry.table_mut(game_id) else {
            warn!("Client {} reset unknown game {}", client, game_id);
            return;
        };

        table.game.reset();
        self.broadcast_state(game_id);
    }

    fn handle_voice(&mut self, client: ClientId, signal: VoiceSignal) {
        let Some(target) = self.voice.route(&self.registry, client, &signal) else {
            return;
        };
        if !self.clients.send(target, ServerMessage::Voice(signal).encode()) {
            debug!("Voice signal to client {} dropped: not writable", target);
        }
    }

    fn send(&self, client: ClientId, message: &ServerMessage) {
        self.clients.send(client, message.encode());
    }

    /// Sends one shared frame to every subscriber of a game.
    fn broadcast(&self, game_id: u32, frame: Bytes) {
        if let Some(table) = self.registry.table(game_id) {
            for subscriber in table.subscribers() {
                self.clients.send(subscriber, frame.clone());
            }
        }
    }

    /// Pushes the game state to every subscriber, each with its own seat.
    fn broadcast_state(&self, game_id: u32) {
        let Some(table) = self.registry.table(game_id) else {
            return;
        };
        for subscriber in table.subscribers() {
            let snapshot = table.game.snapshot(table.seat_of(subscriber));
            self.clients
                .send(subscriber, ServerMessage::GameState(snapshot).encode());
        }
    }
}
