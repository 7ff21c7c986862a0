//! Client-side view of the game being played
//!
//! The server is authoritative; this only remembers the last things it said.

use chess_shared::protocol::{AvailableGame, GameSnapshot, ServerMessage};
use chess_shared::{GameStatus, Move, MoveStatus, Seat};
use log::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct ClientGameState {
    /// Full id of the game we asked to join. State frames only carry its low byte.
    pub game_id: Option<u32>,
    pub seat: Option<Seat>,
    pub snapshot: Option<GameSnapshot>,
    pub last_move: Option<(Move, MoveStatus)>,
    pub open_games: Vec<AvailableGame>,
    pub last_created: Option<u32>,
    pub rejected: bool,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers the game a join request was sent for.
    pub fn joining(&mut self, game_id: u32) {
        self.game_id = Some(game_id);
        self.rejected = false;
    }

    /// Folds a server message into the local view.
    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::GameState(snapshot) => {
                if let Some(game_id) = self.game_id {
                    if snapshot.game_id != game_id as u8 {
                        warn!(
                            "State for game byte {} while playing game {}",
                            snapshot.game_id, game_id
                        );
                    }
                }
                self.seat = snapshot.assigned_seat;
                self.snapshot = Some(snapshot.clone());
            }
            ServerMessage::MoveResult { mv, status, .. } => {
                self.last_move = Some((*mv, *status));
            }
            ServerMessage::GameCreated { game_id } => {
                self.last_created = Some(*game_id);
            }
            ServerMessage::GameList(games) => {
                self.open_games = games.clone();
            }
            ServerMessage::JoinRejected { game_id, .. } => {
                debug!("Join of game {} rejected", game_id);
                self.rejected = true;
                self.seat = None;
            }
            ServerMessage::Voice(_) => {}
        }
    }

    pub fn is_my_turn(&self) -> bool {
        match (&self.snapshot, self.seat) {
            (Some(snapshot), Some(seat)) => {
                snapshot.status == GameStatus::Ongoing && snapshot.turn == seat
            }
            _ => false,
        }
    }

    pub fn is_over(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|snapshot| snapshot.status.is_terminal())
    }
}
