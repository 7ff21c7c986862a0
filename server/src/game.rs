//! Authoritative chess rules for a single game.
//!
//! Pure state transitions, no I/O: the session layer decides who hears about
//! the result. Legality is pseudo-legal; a move that leaves the mover's own
//! king attacked is still accepted, and checkmate/stalemate mean the side to
//! move has no move at all. Castling, en passant capture and promotion are
//! not modeled.

use chess_shared::protocol::{truncate_game_id, GameSnapshot};
use chess_shared::{
    row_col, square_at, Board, EndReason, GameStatus, Move, Piece, PieceKind, Seat,
    BOARD_SQUARES, EMPTY, INITIAL_BOARD,
};
use log::{debug, info};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    #[error("illegal move")]
    Illegal,
    #[error("game is already over")]
    GameAlreadyOver,
}

impl MoveError {
    pub fn status(self) -> chess_shared::MoveStatus {
        match self {
            MoveError::Illegal => chess_shared::MoveStatus::Illegal,
            MoveError::GameAlreadyOver => chess_shared::MoveStatus::AlreadyOver,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub id: u32,
    pub board: Board,
    pub turn: Seat,
    pub halfmove_clock: u8,
    pub fullmove_number: u16,
    /// Carried on the wire, never computed.
    pub en_passant: Option<u8>,
    pub status: GameStatus,
    pub winner: Option<Seat>,
    pub end_reason: EndReason,
}

impl Game {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            board: INITIAL_BOARD,
            turn: Seat::White,
            halfmove_clock: 0,
            fullmove_number: 1,
            en_passant: None,
            status: GameStatus::Ongoing,
            winner: None,
            end_reason: EndReason::None,
        }
    }

    /// Builds an ongoing game from an arbitrary position.
    pub fn from_position(id: u32, board: Board, turn: Seat) -> Self {
        Self {
            board,
            turn,
            ..Self::new(id)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Restores the starting position and clears the result.
    pub fn reset(&mut self) {
        *self = Self::new(self.id);
        info!("Game {} reset to initial position", self.id);
    }

    pub fn piece_at(&self, square: u8) -> Option<Piece> {
        self.board
            .get(square as usize)
            .and_then(|&cell| Piece::from_cell(cell))
    }

    /// Legality for the side to move.
    pub fn is_legal_move(&self, from: u8, to: u8) -> bool {
        self.is_legal_for(self.turn, from, to)
    }

    /// Legality as if `side` were to move, regardless of the actual turn.
    /// This is also the attack primitive.
    pub fn is_legal_for(&self, side: Seat, from: u8, to: u8) -> bool {
        if from as usize >= BOARD_SQUARES || to as usize >= BOARD_SQUARES || from == to {
            return false;
        }
        let Some(piece) = self.piece_at(from) else {
            return false;
        };
        if piece.color != side {
            return false;
        }
        let target = self.piece_at(to);
        if target.is_some_and(|t| t.color == piece.color) {
            return false;
        }

        let (from_row, from_col) = row_col(from);
        let (to_row, to_col) = row_col(to);
        let row_diff = (to_row - from_row).abs();
        let col_diff = (to_col - from_col).abs();

        match piece.kind {
            PieceKind::Pawn => self.is_legal_pawn_move(piece.color, from, to, target.is_some()),
            PieceKind::Knight => {
                (row_diff == 2 && col_diff == 1) || (row_diff == 1 && col_diff == 2)
            }
            PieceKind::Bishop => row_diff == col_diff && self.is_path_clear(from, to),
            PieceKind::Rook => {
                (from_row == to_row || from_col == to_col) && self.is_path_clear(from, to)
            }
            PieceKind::Queen => {
                (from_row == to_row || from_col == to_col || row_diff == col_diff)
                    && self.is_path_clear(from, to)
            }
            PieceKind::King => row_diff <= 1 && col_diff <= 1,
        }
    }

    fn is_legal_pawn_move(&self, color: Seat, from: u8, to: u8, is_capture: bool) -> bool {
        let (direction, start_row) = match color {
            Seat::White => (-1, 6),
            Seat::Black => (1, 1),
        };
        let (from_row, from_col) = row_col(from);
        let (to_row, to_col) = row_col(to);

        if from_col == to_col && !is_capture {
            if to_row == from_row + direction {
                return true;
            }
            if from_row == start_row && to_row == from_row + 2 * direction {
                return square_at(from_row + direction, from_col)
                    .is_some_and(|between| self.board[between as usize] == EMPTY);
            }
            return false;
        }

        // Diagonal steps only capture.
        (to_col - from_col).abs() == 1 && to_row == from_row + direction && is_capture
    }

    /// True when every square strictly between `from` and `to` is empty.
    /// Only meaningful for squares on a shared rank, file or diagonal.
    fn is_path_clear(&self, from: u8, to: u8) -> bool {
        let (from_row, from_col) = row_col(from);
        let (to_row, to_col) = row_col(to);
        let step_row = (to_row - from_row).signum();
        let step_col = (to_col - from_col).signum();

        let (mut row, mut col) = (from_row + step_row, from_col + step_col);
        while (row, col) != (to_row, to_col) {
            match square_at(row, col) {
                Some(square) if self.board[square as usize] == EMPTY => {}
                _ => return false,
            }
            row += step_row;
            col += step_col;
        }
        true
    }

    pub fn find_king(&self, side: Seat) -> Option<u8> {
        let king = Piece::new(PieceKind::King, side).to_cell();
        self.board
            .iter()
            .position(|&cell| cell == king)
            .map(|square| square as u8)
    }

    /// Does any piece of color `by` attack `square`?
    pub fn is_square_attacked(&self, square: u8, by: Seat) -> bool {
        (0..BOARD_SQUARES as u8).any(|from| self.is_legal_for(by, from, square))
    }

    /// A side without a king is never in check.
    pub fn is_in_check(&self, side: Seat) -> bool {
        self.find_king(side)
            .is_some_and(|king| self.is_square_attacked(king, side.opponent()))
    }

    /// Brute-force scan of every origin/destination pair for `side`.
    pub fn legal_moves(&self, side: Seat) -> impl Iterator<Item = Move> + '_ {
        (0..BOARD_SQUARES as u8)
            .filter(move |&from| self.piece_at(from).is_some_and(|p| p.color == side))
            .flat_map(move |from| {
                (0..BOARD_SQUARES as u8)
                    .filter(move |&to| self.is_legal_for(side, from, to))
                    .map(move |to| Move::new(from, to))
            })
    }

    pub fn has_any_legal_move(&self, side: Seat) -> bool {
        self.legal_moves(side).next().is_some()
    }

    /// Validates and applies a move, then checks whether the side now to move
    /// is checkmated or stalemated. Nothing is mutated on error.
    pub fn apply_move(&mut self, mv: Move) -> Result<(), MoveError> {
        if self.is_terminal() {
            debug!("Game {}: move {:?} after game end", self.id, mv);
            return Err(MoveError::GameAlreadyOver);
        }
        if !self.is_legal_move(mv.from, mv.to) {
            debug!("Game {}: illegal move {} -> {}", self.id, mv.from, mv.to);
            return Err(MoveError::Illegal);
        }

        let (from, to) = (mv.from as usize, mv.to as usize);
        self.board[to] = self.board[from];
        self.board[from] = EMPTY;
        self.turn = self.turn.opponent();
        if self.turn == Seat::White {
            self.fullmove_number = self.fullmove_number.wrapping_add(1);
        }

        self.evaluate_end_of_game();
        Ok(())
    }

    /// Ends the game if the side to move has no legal move.
    pub fn evaluate_end_of_game(&mut self) {
        let mover = self.turn;
        let in_check = self.is_in_check(mover);
        if self.has_any_legal_move(mover) {
            return;
        }

        if in_check {
            self.finish(
                GameStatus::won_by(mover.opponent()),
                Some(mover.opponent()),
                EndReason::Checkmate,
            );
            info!("Game {}: checkmate, {:?} wins", self.id, mover.opponent());
        } else {
            self.finish(GameStatus::Draw, None, EndReason::Stalemate);
            info!("Game {}: stalemate", self.id);
        }
    }

    /// The opposite seat wins. Rejected once the game is over.
    pub fn surrender(&mut self, seat: Seat) -> Result<(), MoveError> {
        if self.is_terminal() {
            return Err(MoveError::GameAlreadyOver);
        }
        let winner = seat.opponent();
        self.finish(GameStatus::won_by(winner), Some(winner), EndReason::Surrender);
        info!("Game {}: {:?} surrendered", self.id, seat);
        Ok(())
    }

    /// A seated player left mid-game; the remaining seat wins.
    pub fn forfeit(&mut self, leaving: Seat) -> Result<(), MoveError> {
        if self.is_terminal() {
            return Err(MoveError::GameAlreadyOver);
        }
        let winner = leaving.opponent();
        self.finish(GameStatus::won_by(winner), Some(winner), EndReason::Disconnect);
        info!("Game {}: {:?} wins by forfeit", self.id, winner);
        Ok(())
    }

    fn finish(&mut self, status: GameStatus, winner: Option<Seat>, reason: EndReason) {
        self.status = status;
        self.winner = winner;
        self.end_reason = reason;
    }

    /// Wire view of this game for one receiver.
    pub fn snapshot(&self, assigned_seat: Option<Seat>) -> GameSnapshot {
        GameSnapshot {
            game_id: truncate_game_id(self.id),
            turn: self.turn,
            board: self.board,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number as u8,
            en_passant: self.en_passant,
            status: self.status,
            winner: self.winner,
            assigned_seat,
            end_reason: self.end_reason,
        }
    }
}
