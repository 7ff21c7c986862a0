//! # Chess Client Library
//!
//! A thin terminal client for the chess server. The server decides
//! everything; the client encodes what the player typed, decodes what the
//! server pushes back and prints it.
//!
//! ## Module Organization
//!
//! - `network`: WebSocket connection speaking the binary protocol
//! - `game`: the last state, seat and results the server reported
//! - `input`: command parsing, algebraic square names, voice payload JSON
//! - `rendering`: text board and status line
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use chess_client::network::ChessClient;
//! use chess_shared::protocol::{ClientMessage, ServerMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = ChessClient::connect("ws://127.0.0.1:9001/chess").await?;
//!     client.send(&ClientMessage::CreateGame).await?;
//!     if let ServerMessage::GameCreated { game_id } = client.next_message().await? {
//!         println!("created game {}", game_id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;

pub use network::{ChessClient, ClientError};
