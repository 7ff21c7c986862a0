//! Vocabulary shared by the chess server and its clients.
//!
//! Everything that crosses the wire lives here: the board encoding, seats,
//! game status codes, and the binary `protocol` module that turns them into
//! frames. The server owns the rules; this crate only names things.

pub mod protocol;

/// Number of cells on the board.
pub const BOARD_SQUARES: usize = 64;
/// Board side length.
pub const BOARD_WIDTH: u8 = 8;
/// Cell value of an empty square.
pub const EMPTY: u8 = 0;
/// Wire sentinel meaning "none" for optional one-byte fields.
pub const NONE_BYTE: u8 = 255;

/// 64 cells, index = rank * 8 + file. 0 is empty, 1..=6 are white
/// pawn/knight/bishop/rook/queen/king, 7..=12 the same black pieces.
pub type Board = [u8; BOARD_SQUARES];

/// Canonical starting position. Row 0 is black's home rank.
pub const INITIAL_BOARD: Board = [
    10, 8, 9, 11, 12, 9, 8, 10, // black back rank
    7, 7, 7, 7, 7, 7, 7, 7, // black pawns
    0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, //
    1, 1, 1, 1, 1, 1, 1, 1, // white pawns
    4, 2, 3, 5, 6, 3, 2, 4, // white back rank
];

/// One of the two colored player slots of a game. Also used as "side to move".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Seat {
    White = 0,
    Black = 1,
}

impl Seat {
    pub fn from_u8(value: u8) -> Option<Seat> {
        match value {
            0 => Some(Seat::White),
            1 => Some(Seat::Black),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn opponent(self) -> Seat {
        match self {
            Seat::White => Seat::Black,
            Seat::Black => Seat::White,
        }
    }

    /// Encodes an optional seat, using `NONE_BYTE` for spectators / no winner.
    pub fn option_to_u8(seat: Option<Seat>) -> u8 {
        seat.map_or(NONE_BYTE, Seat::as_u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    Pawn = 1,
    Knight = 2,
    Bishop = 3,
    Rook = 4,
    Queen = 5,
    King = 6,
}

impl PieceKind {
    fn from_offset(value: u8) -> Option<PieceKind> {
        match value {
            1 => Some(PieceKind::Pawn),
            2 => Some(PieceKind::Knight),
            3 => Some(PieceKind::Bishop),
            4 => Some(PieceKind::Rook),
            5 => Some(PieceKind::Queen),
            6 => Some(PieceKind::King),
            _ => None,
        }
    }
}

/// A decoded board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Seat,
}

impl Piece {
    pub fn new(kind: PieceKind, color: Seat) -> Self {
        Self { kind, color }
    }

    /// Returns `None` for empty cells and for values outside 1..=12.
    pub fn from_cell(cell: u8) -> Option<Piece> {
        match cell {
            1..=6 => PieceKind::from_offset(cell).map(|kind| Piece::new(kind, Seat::White)),
            7..=12 => PieceKind::from_offset(cell - 6).map(|kind| Piece::new(kind, Seat::Black)),
            _ => None,
        }
    }

    pub fn to_cell(self) -> u8 {
        match self.color {
            Seat::White => self.kind as u8,
            Seat::Black => self.kind as u8 + 6,
        }
    }
}

/// Overall game status. Anything but `Ongoing` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing = 0,
    WhiteWins = 1,
    BlackWins = 2,
    Draw = 3,
}

impl GameStatus {
    pub fn from_u8(value: u8) -> Option<GameStatus> {
        match value {
            0 => Some(GameStatus::Ongoing),
            1 => Some(GameStatus::WhiteWins),
            2 => Some(GameStatus::BlackWins),
            3 => Some(GameStatus::Draw),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != GameStatus::Ongoing
    }

    /// Status value for a game won by `seat`.
    pub fn won_by(seat: Seat) -> GameStatus {
        match seat {
            Seat::White => GameStatus::WhiteWins,
            Seat::Black => GameStatus::BlackWins,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    None = 0,
    Checkmate = 1,
    Stalemate = 2,
    Surrender = 3,
    Disconnect = 4,
}

impl EndReason {
    pub fn from_u8(value: u8) -> Option<EndReason> {
        match value {
            0 => Some(EndReason::None),
            1 => Some(EndReason::Checkmate),
            2 => Some(EndReason::Stalemate),
            3 => Some(EndReason::Surrender),
            4 => Some(EndReason::Disconnect),
            _ => None,
        }
    }
}

/// Outcome code carried by `MoveResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStatus {
    Ok = 0,
    Illegal = 1,
    AlreadyOver = 2,
}

impl MoveStatus {
    pub fn from_u8(value: u8) -> Option<MoveStatus> {
        match value {
            0 => Some(MoveStatus::Ok),
            1 => Some(MoveStatus::Illegal),
            2 => Some(MoveStatus::AlreadyOver),
            _ => None,
        }
    }
}

/// Reason code carried by `JoinRejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    GameFull = 1,
}

impl JoinError {
    pub fn from_u8(value: u8) -> Option<JoinError> {
        match value {
            1 => Some(JoinError::GameFull),
            _ => None,
        }
    }
}

/// A requested move. `promo` travels on the wire but is never applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: u8,
    pub to: u8,
    pub promo: u8,
}

impl Move {
    pub fn new(from: u8, to: u8) -> Self {
        Self { from, to, promo: 0 }
    }
}

/// Row (rank index from black's side) and column of a square.
pub fn row_col(square: u8) -> (i8, i8) {
    ((square / BOARD_WIDTH) as i8, (square % BOARD_WIDTH) as i8)
}

/// Square index from row/column, `None` when off the board.
pub fn square_at(row: i8, col: i8) -> Option<u8> {
    let width = BOARD_WIDTH as i8;
    if (0..width).contains(&row) && (0..width).contains(&col) {
        Some((row * width + col) as u8)
    } else {
        None
    }
}
