//! Plain-text board output

use crate::input::square_name;
use chess_shared::protocol::GameSnapshot;
use chess_shared::{Board, EndReason, GameStatus, Piece, PieceKind, Seat, BOARD_WIDTH};

fn glyph(cell: u8) -> char {
    let Some(piece) = Piece::from_cell(cell) else {
        return '.';
    };
    let letter = match piece.kind {
        PieceKind::Pawn => 'p',
        PieceKind::Knight => 'n',
        PieceKind::Bishop => 'b',
        PieceKind::Rook => 'r',
        PieceKind::Queen => 'q',
        PieceKind::King => 'k',
    };
    match piece.color {
        Seat::White => letter.to_ascii_uppercase(),
        Seat::Black => letter,
    }
}

/// Draws the board with `perspective`'s pieces at the bottom.
pub fn render_board(board: &Board, perspective: Seat) -> String {
    let rows: Vec<u8> = match perspective {
        Seat::White => (0..BOARD_WIDTH).collect(),
        Seat::Black => (0..BOARD_WIDTH).rev().collect(),
    };

    let mut out = String::new();
    for &row in &rows {
        out.push(char::from(b'8' - row));
        out.push(' ');
        for i in 0..BOARD_WIDTH {
            let col = if perspective == Seat::White {
                i
            } else {
                BOARD_WIDTH - 1 - i
            };
            out.push(' ');
            out.push(glyph(board[(row * BOARD_WIDTH + col) as usize]));
        }
        out.push('\n');
    }

    out.push_str("  ");
    for i in 0..BOARD_WIDTH {
        let col = if perspective == Seat::White {
            i
        } else {
            BOARD_WIDTH - 1 - i
        };
        out.push(' ');
        out.push(char::from(b'a' + col));
    }
    out.push('\n');
    out
}

/// One-line summary of whose move it is or how the game ended.
pub fn describe(snapshot: &GameSnapshot) -> String {
    let seat = match snapshot.assigned_seat {
        Some(seat) => format!("{:?}", seat),
        None => "spectator".to_string(),
    };

    let status = match snapshot.status {
        GameStatus::Ongoing => format!("{:?} to move", snapshot.turn),
        GameStatus::Draw => format!("draw by {:?}", snapshot.end_reason).to_lowercase(),
        GameStatus::WhiteWins | GameStatus::BlackWins => {
            let winner = if snapshot.status == GameStatus::WhiteWins {
                Seat::White
            } else {
                Seat::Black
            };
            match snapshot.end_reason {
                EndReason::None => format!("{:?} wins", winner),
                reason => format!("{:?} wins by {:?}", winner, reason).to_lowercase(),
            }
        }
    };

    let en_passant = snapshot
        .en_passant
        .map(|square| format!(", en passant {}", square_name(square)))
        .unwrap_or_default();

    format!(
        "game {} | you: {} | move {} | {}{}",
        snapshot.game_id, seat, snapshot.fullmove_number, status, en_passant
    )
}
