//! # Chess Server Library
//!
//! Authoritative server for two-player chess over WebSockets. The server owns
//! every game, validates moves and turn order, detects checkmate and
//! stalemate, seats players, pushes state to everyone watching a game and
//! relays voice-chat signaling between the two players.
//!
//! ## Module Organization
//!
//! - `game`: rules engine for a single game, no I/O
//! - `registry`: game table, seats, subscribers and connection bindings
//! - `voice`: blind relay for offer/answer/ICE payloads
//! - `client_manager`: live connections and their outbound queues
//! - `session`: decodes frames, drives the modules above, fans out replies
//! - `network`: listener, WebSocket upgrade and the worker loop
//!
//! ## Concurrency
//!
//! Connection tasks only move bytes. Every decoded message is handled by one
//! worker that owns all game state, so a game never sees two messages at
//! once and no locks are needed.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use chess_server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("0.0.0.0:9001", "/chess", 256).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod error;
pub mod game;
pub mod network;
pub mod registry;
pub mod session;
pub mod voice;
