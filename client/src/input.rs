//! Terminal command parsing and square notation
//!
//! Squares use algebraic names: "a8" is index 0, "h1" is index 63.

use crate::game::ClientGameState;
use chess_shared::protocol::{ClientMessage, SignalKind, VoiceSignal};
use chess_shared::{Move, Seat, BOARD_WIDTH};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown command '{0}', try 'help'")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("'{0}' is not a square")]
    BadSquare(String),
    #[error("join a game first")]
    NoGame,
    #[error("you are not seated")]
    NoSeat,
    #[error("voice payload: {0}")]
    Payload(String),
}

/// SDP offer or answer as the browser serializes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: String,
    pub sdp: String,
}

impl SessionDescription {
    pub fn new(kind: &str, sdp: &str) -> Self {
        Self {
            kind: kind.to_string(),
            sdp: sdp.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create,
    List,
    Join { game_id: u32, seat: Option<Seat> },
    Move { from: u8, to: u8 },
    Surrender,
    Reset,
    Offer(String),
    Answer(String),
    Ice(IceCandidate),
    Board,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  create                  create a new game
  list                    list games waiting for an opponent
  join <id> [white|black] join a game
  move <from> <to>        e.g. move e2 e4
  surrender | reset | board | quit
  offer <sdp> | answer <sdp> | ice <candidate> [mid] [index]";

/// "e2" -> 52
pub fn parse_square(text: &str) -> Option<u8> {
    let bytes = text.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].to_ascii_lowercase();
    let rank = bytes[1];
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }
    let row = BOARD_WIDTH - (rank - b'0');
    Some(row * BOARD_WIDTH + (file - b'a'))
}

pub fn square_name(square: u8) -> String {
    if square >= BOARD_WIDTH * BOARD_WIDTH {
        return format!("#{}", square);
    }
    let file = char::from(b'a' + square % BOARD_WIDTH);
    let rank = char::from(b'8' - square / BOARD_WIDTH);
    format!("{}{}", file, rank)
}

pub fn parse_seat(text: &str) -> Option<Seat> {
    match text.to_ascii_lowercase().as_str() {
        "white" | "w" | "0" => Some(Seat::White),
        "black" | "b" | "1" => Some(Seat::Black),
        _ => None,
    }
}

fn square_arg(text: Option<&str>) -> Result<u8, InputError> {
    let text = text.ok_or(InputError::Usage("move <from> <to>"))?;
    parse_square(text).ok_or_else(|| InputError::BadSquare(text.to_string()))
}

pub fn parse_command(line: &str) -> Result<Command, InputError> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Err(InputError::Usage("help"));
    };

    match word.to_ascii_lowercase().as_str() {
        "create" => Ok(Command::Create),
        "list" => Ok(Command::List),
        "join" => {
            let game_id = words
                .next()
                .and_then(|id| id.parse().ok())
                .ok_or(InputError::Usage("join <id> [white|black]"))?;
            let seat = words.next().and_then(parse_seat);
            Ok(Command::Join { game_id, seat })
        }
        "move" | "mv" => {
            let from = square_arg(words.next())?;
            let to = square_arg(words.next())?;
            Ok(Command::Move { from, to })
        }
        "surrender" | "resign" => Ok(Command::Surrender),
        "reset" => Ok(Command::Reset),
        "offer" | "answer" => {
            let sdp = words.collect::<Vec<_>>().join(" ");
            if sdp.is_empty() {
                return Err(InputError::Usage("offer|answer <sdp>"));
            }
            Ok(if word.eq_ignore_ascii_case("offer") {
                Command::Offer(sdp)
            } else {
                Command::Answer(sdp)
            })
        }
        "ice" => {
            let candidate = words
                .next()
                .ok_or(InputError::Usage("ice <candidate> [mid] [index]"))?
                .to_string();
            let sdp_mid = words.next().map(str::to_string);
            let sdp_mline_index = words.next().and_then(|index| index.parse().ok());
            Ok(Command::Ice(IceCandidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            }))
        }
        "board" => Ok(Command::Board),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(InputError::UnknownCommand(other.to_string())),
    }
}

fn voice(
    kind: SignalKind,
    game_id: u32,
    json: serde_json::Result<String>,
) -> Result<ClientMessage, InputError> {
    let json = json.map_err(|e| InputError::Payload(e.to_string()))?;
    VoiceSignal::new(kind, game_id, json.into_bytes())
        .map(ClientMessage::Voice)
        .map_err(|e| InputError::Payload(e.to_string()))
}

impl Command {
    /// Wire message for this command, if it talks to the server at all.
    pub fn to_message(
        &self,
        state: &ClientGameState,
    ) -> Result<Option<ClientMessage>, InputError> {
        let game_id = || state.game_id.ok_or(InputError::NoGame);

        let message = match self {
            Command::Create => ClientMessage::CreateGame,
            Command::List => ClientMessage::ListGames,
            Command::Join { game_id, seat } => ClientMessage::JoinGame {
                game_id: *game_id,
                requested_seat: *seat,
            },
            Command::Move { from, to } => ClientMessage::MovePiece {
                game_id: game_id()?,
                mv: Move::new(*from, *to),
            },
            Command::Surrender => ClientMessage::Surrender {
                game_id: game_id()?,
                seat: state.seat.ok_or(InputError::NoSeat)?,
            },
            Command::Reset => ClientMessage::ResetGame {
                game_id: game_id()?,
            },
            Command::Offer(sdp) => voice(
                SignalKind::Offer,
                game_id()?,
                serde_json::to_string(&SessionDescription::new("offer", sdp)),
            )?,
            Command::Answer(sdp) => voice(
                SignalKind::Answer,
                game_id()?,
                serde_json::to_string(&SessionDescription::new("answer", sdp)),
            )?,
            Command::Ice(candidate) => voice(
                SignalKind::IceCandidate,
                game_id()?,
                serde_json::to_string(candidate),
            )?,
            Command::Board | Command::Help | Command::Quit => return Ok(None),
        };
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_square_notation() {
        assert_eq!(parse_square("a8"), Some(0));
        assert_eq!(parse_square("h1"), Some(63));
        assert_eq!(parse_square("e2"), Some(52));
        assert_eq!(parse_square("E4"), Some(36));
        assert_eq!(parse_square("i1"), None);
        assert_eq!(parse_square("a9"), None);
        assert_eq!(parse_square("e"), None);

        assert_eq!(square_name(52), "e2");
        assert_eq!(square_name(0), "a8");
        assert_eq!(square_name(200), "#200");
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("create"), Ok(Command::Create));
        assert_eq!(
            parse_command("join 12 black"),
            Ok(Command::Join {
                game_id: 12,
                seat: Some(Seat::Black)
            })
        );
        assert_eq!(
            parse_command("join 3"),
            Ok(Command::Join {
                game_id: 3,
                seat: None
            })
        );
        assert_eq!(
            parse_command("move e2 e4"),
            Ok(Command::Move { from: 52, to: 36 })
        );
        assert_eq!(
            parse_command("move e2 z9"),
            Err(InputError::BadSquare("z9".to_string()))
        );
        assert_eq!(
            parse_command("dance"),
            Err(InputError::UnknownCommand("dance".to_string()))
        );
        assert!(parse_command("   ").is_err());
    }

    #[test]
    fn test_game_commands_need_a_game() {
        let state = ClientGameState::new();
        assert_eq!(
            Command::Move { from: 52, to: 36 }.to_message(&state),
            Err(InputError::NoGame)
        );
        assert_eq!(Command::Board.to_message(&state), Ok(None));
        assert_eq!(
            Command::Create.to_message(&state),
            Ok(Some(ClientMessage::CreateGame))
        );
    }

    #[test]
    fn test_surrender_uses_own_seat() {
        let mut state = ClientGameState::new();
        state.joining(5);
        assert_eq!(Command::Surrender.to_message(&state), Err(InputError::NoSeat));

        state.seat = Some(Seat::Black);
        assert_eq!(
            Command::Surrender.to_message(&state),
            Ok(Some(ClientMessage::Surrender {
                game_id: 5,
                seat: Seat::Black
            }))
        );
    }

    #[test]
    fn test_voice_payloads_are_json() {
        let mut state = ClientGameState::new();
        state.joining(7);

        let command = assert_ok!(parse_command("offer v=0 o=-"));
        let message = assert_ok!(command.to_message(&state)).unwrap();
        let ClientMessage::Voice(signal) = message else {
            panic!("expected voice signal");
        };
        assert_eq!(signal.kind, SignalKind::Offer);
        assert_eq!(signal.game_id, 7);
        let description: SessionDescription =
            assert_ok!(serde_json::from_slice(signal.payload()));
        assert_eq!(description.kind, "offer");
        assert_eq!(description.sdp, "v=0 o=-");

        let command = assert_ok!(parse_command("ice candidate:1 0 0"));
        let message = assert_ok!(command.to_message(&state)).unwrap();
        let ClientMessage::Voice(signal) = message else {
            panic!("expected voice signal");
        };
        assert_eq!(
            assert_ok!(signal.payload_str()),
            r#"{"candidate":"candidate:1","sdpMid":"0","sdpMLineIndex":0}"#
        );
    }
}
