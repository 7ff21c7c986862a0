//! Fixed-layout binary frames exchanged between the server and its clients.
//!
//! Every frame starts with a one-byte tag, except the game-state push which is
//! untagged and always 76 bytes long. Integer fields in the four client
//! requests that carry a game id (join, move, surrender, reset) are
//! little-endian; every server-originated field and the voice-signal game id
//! are big-endian. The asymmetry is part of the wire contract.
//!
//! Decoders never panic on short input: any frame that is empty, truncated,
//! carries an unknown tag or an out-of-range enum byte yields a
//! [`ProtocolError`], which the server treats as a malformed frame.

use crate::{
    Board, EndReason, GameStatus, JoinError, Move, MoveStatus, Seat, BOARD_SQUARES, NONE_BYTE,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

pub const JOIN_GAME: u8 = 1;
pub const MOVE_PIECE: u8 = 2;
pub const SURRENDER: u8 = 3;
pub const RESET_GAME: u8 = 4;
pub const CREATE_GAME: u8 = 5;
pub const LIST_GAMES: u8 = 6;

pub const VOICE_OFFER: u8 = 10;
pub const VOICE_ANSWER: u8 = 11;
pub const VOICE_ICE_CANDIDATE: u8 = 12;

pub const JOIN_REJECTED: u8 = 100;
pub const MOVE_RESULT: u8 = 101;
pub const GAME_CREATED: u8 = 102;
pub const GAME_LIST: u8 = 103;

/// Size of the untagged game-state frame.
pub const GAME_STATE_LEN: usize = 76;
/// Tag, game id and payload length of a voice frame.
pub const VOICE_HEADER_LEN: usize = 7;
/// The list count is a single byte.
pub const MAX_LISTED_GAMES: usize = u8::MAX as usize;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,
    #[error("unknown message tag {0}")]
    UnknownTag(u8),
    #[error("frame with tag {tag} truncated: need {needed} bytes, got {actual}")]
    Truncated { tag: u8, needed: usize, actual: usize },
    #[error("invalid {field} value {value}")]
    InvalidField { field: &'static str, value: u8 },
    #[error("voice payload of {0} bytes does not fit a u16 length")]
    PayloadTooLarge(usize),
}

fn ensure_len(frame: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if frame.len() < needed {
        return Err(ProtocolError::Truncated {
            tag: frame.first().copied().unwrap_or_default(),
            needed,
            actual: frame.len(),
        });
    }
    Ok(())
}

fn optional_seat(field: &'static str, value: u8) -> Result<Option<Seat>, ProtocolError> {
    match value {
        NONE_BYTE => Ok(None),
        other => Seat::from_u8(other)
            .map(Some)
            .ok_or(ProtocolError::InvalidField { field, value }),
    }
}

/// The game-state frame carries only the low byte of the game id.
///
/// Ids above 255 wrap; receivers cannot tell game 1 from game 257.
pub fn truncate_game_id(game_id: u32) -> u8 {
    game_id as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn tag(self) -> u8 {
        match self {
            SignalKind::Offer => VOICE_OFFER,
            SignalKind::Answer => VOICE_ANSWER,
            SignalKind::IceCandidate => VOICE_ICE_CANDIDATE,
        }
    }

    pub fn from_tag(tag: u8) -> Option<SignalKind> {
        match tag {
            VOICE_OFFER => Some(SignalKind::Offer),
            VOICE_ANSWER => Some(SignalKind::Answer),
            VOICE_ICE_CANDIDATE => Some(SignalKind::IceCandidate),
            _ => None,
        }
    }
}

/// Opaque voice-chat signaling payload addressed to a game.
///
/// The payload is UTF-8 JSON produced by the browser; the server forwards the
/// bytes untouched and never parses them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSignal {
    pub kind: SignalKind,
    pub game_id: u32,
    payload: Bytes,
}

impl VoiceSignal {
    pub fn new(
        kind: SignalKind,
        game_id: u32,
        payload: impl Into<Bytes>,
    ) -> Result<Self, ProtocolError> {
        let payload = payload.into();
        if payload.len() > u16::MAX as usize {
            return Err(ProtocolError::PayloadTooLarge(payload.len()));
        }
        Ok(Self {
            kind,
            game_id,
            payload,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.payload)
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(VOICE_HEADER_LEN + self.payload.len());
        buf.put_u8(self.kind.tag());
        buf.put_u32(self.game_id);
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
    }

    fn decode(kind: SignalKind, frame: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(frame, VOICE_HEADER_LEN)?;
        let mut body = &frame[1..];
        let game_id = body.get_u32();
        let payload_len = body.get_u16() as usize;
        ensure_len(frame, VOICE_HEADER_LEN + payload_len)?;
        Ok(Self {
            kind,
            game_id,
            payload: Bytes::copy_from_slice(&body[..payload_len]),
        })
    }
}

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `requested_seat` is `None` when the seat byte was neither 0 nor 1.
    JoinGame {
        game_id: u32,
        requested_seat: Option<Seat>,
    },
    MovePiece {
        game_id: u32,
        mv: Move,
    },
    Surrender {
        game_id: u32,
        seat: Seat,
    },
    ResetGame {
        game_id: u32,
    },
    CreateGame,
    ListGames,
    Voice(VoiceSignal),
}

impl ClientMessage {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        match self {
            ClientMessage::JoinGame {
                game_id,
                requested_seat,
            } => {
                buf.put_u8(JOIN_GAME);
                buf.put_u32_le(*game_id);
                buf.put_u8(Seat::option_to_u8(*requested_seat));
            }
            ClientMessage::MovePiece { game_id, mv } => {
                buf.put_u8(MOVE_PIECE);
                buf.put_u32_le(*game_id);
                buf.put_u8(mv.from);
                buf.put_u8(mv.to);
                buf.put_u8(mv.promo);
            }
            ClientMessage::Surrender { game_id, seat } => {
                buf.put_u8(SURRENDER);
                buf.put_u32_le(*game_id);
                buf.put_u8(seat.as_u8());
            }
            ClientMessage::ResetGame { game_id } => {
                buf.put_u8(RESET_GAME);
                buf.put_u32_le(*game_id);
            }
            ClientMessage::CreateGame => buf.put_u8(CREATE_GAME),
            ClientMessage::ListGames => buf.put_u8(LIST_GAMES),
            ClientMessage::Voice(signal) => signal.encode_into(&mut buf),
        }
        buf.freeze()
    }

    /// Trailing bytes after a complete body are ignored.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let tag = *frame.first().ok_or(ProtocolError::Empty)?;
        let mut body = &frame[1..];

        match tag {
            JOIN_GAME => {
                ensure_len(frame, 6)?;
                Ok(ClientMessage::JoinGame {
                    game_id: body.get_u32_le(),
                    requested_seat: Seat::from_u8(body.get_u8()),
                })
            }
            MOVE_PIECE => {
                ensure_len(frame, 8)?;
                let game_id = body.get_u32_le();
                let from = body.get_u8();
                let to = body.get_u8();
                let promo = body.get_u8();
                Ok(ClientMessage::MovePiece {
                    game_id,
                    mv: Move { from, to, promo },
                })
            }
            SURRENDER => {
                ensure_len(frame, 6)?;
                let game_id = body.get_u32_le();
                let value = body.get_u8();
                let seat = Seat::from_u8(value).ok_or(ProtocolError::InvalidField {
                    field: "seat",
                    value,
                })?;
                Ok(ClientMessage::Surrender { game_id, seat })
            }
            RESET_GAME => {
                ensure_len(frame, 5)?;
                Ok(ClientMessage::ResetGame {
                    game_id: body.get_u32_le(),
                })
            }
            CREATE_GAME => Ok(ClientMessage::CreateGame),
            LIST_GAMES => Ok(ClientMessage::ListGames),
            other => match SignalKind::from_tag(other) {
                Some(kind) => VoiceSignal::decode(kind, frame).map(ClientMessage::Voice),
                None => Err(ProtocolError::UnknownTag(other)),
            },
        }
    }
}

/// Lobby entry: a game with exactly one occupied seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailableGame {
    pub game_id: u32,
    pub open_seat: Seat,
}

/// Full game state as pushed to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    /// Low byte of the game id, see [`truncate_game_id`].
    pub game_id: u8,
    pub turn: Seat,
    pub board: Board,
    pub halfmove_clock: u8,
    pub fullmove_number: u8,
    pub en_passant: Option<u8>,
    pub status: GameStatus,
    pub winner: Option<Seat>,
    /// Seat of the receiving connection, `None` for spectators.
    pub assigned_seat: Option<Seat>,
    pub end_reason: EndReason,
}

impl GameSnapshot {
    fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(GAME_STATE_LEN);
        buf.put_u8(self.game_id);
        buf.put_u32(self.turn.as_u8() as u32);
        buf.put_slice(&self.board);
        buf.put_u8(self.halfmove_clock);
        buf.put_u8(self.fullmove_number);
        buf.put_u8(self.en_passant.unwrap_or(NONE_BYTE));
        buf.put_u8(self.status as u8);
        buf.put_u8(Seat::option_to_u8(self.winner));
        buf.put_u8(Seat::option_to_u8(self.assigned_seat));
        buf.put_u8(self.end_reason as u8);
    }

    fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(frame, GAME_STATE_LEN)?;
        let mut body = frame;

        let game_id = body.get_u8();
        let raw_turn = body.get_u32();
        let turn = u8::try_from(raw_turn)
            .ok()
            .and_then(Seat::from_u8)
            .ok_or(ProtocolError::InvalidField {
                field: "turn",
                value: raw_turn.min(u8::MAX as u32) as u8,
            })?;

        let mut board = [0u8; BOARD_SQUARES];
        body.copy_to_slice(&mut board);

        let halfmove_clock = body.get_u8();
        let fullmove_number = body.get_u8();
        let en_passant = match body.get_u8() {
            NONE_BYTE => None,
            square => Some(square),
        };
        let value = body.get_u8();
        let status = GameStatus::from_u8(value).ok_or(ProtocolError::InvalidField {
            field: "status",
            value,
        })?;
        let winner = optional_seat("winner", body.get_u8())?;
        let assigned_seat = optional_seat("assigned seat", body.get_u8())?;
        let value = body.get_u8();
        let end_reason = EndReason::from_u8(value).ok_or(ProtocolError::InvalidField {
            field: "end reason",
            value,
        })?;

        Ok(GameSnapshot {
            game_id,
            turn,
            board,
            halfmove_clock,
            fullmove_number,
            en_passant,
            status,
            winner,
            assigned_seat,
            end_reason,
        })
    }
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    JoinRejected {
        game_id: u32,
        reason: JoinError,
    },
    MoveResult {
        game_id: u32,
        mv: Move,
        status: MoveStatus,
    },
    GameCreated {
        game_id: u32,
    },
    /// At most [`MAX_LISTED_GAMES`] entries are encoded.
    GameList(Vec<AvailableGame>),
    GameState(GameSnapshot),
    Voice(VoiceSignal),
}

impl ServerMessage {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            ServerMessage::JoinRejected { game_id, reason } => {
                buf.put_u8(JOIN_REJECTED);
                buf.put_u32(*game_id);
                buf.put_u8(*reason as u8);
            }
            ServerMessage::MoveResult {
                game_id,
                mv,
                status,
            } => {
                buf.put_u8(MOVE_RESULT);
                buf.put_u32(*game_id);
                buf.put_u8(mv.from);
                buf.put_u8(mv.to);
                buf.put_u8(mv.promo);
                buf.put_u8(*status as u8);
            }
            ServerMessage::GameCreated { game_id } => {
                buf.put_u8(GAME_CREATED);
                buf.put_u32(*game_id);
            }
            ServerMessage::GameList(games) => {
                let count = games.len().min(MAX_LISTED_GAMES);
                buf.reserve(2 + count * 5);
                buf.put_u8(GAME_LIST);
                buf.put_u8(count as u8);
                for game in &games[..count] {
                    buf.put_u32(game.game_id);
                    buf.put_u8(game.open_seat.as_u8());
                }
            }
            ServerMessage::GameState(snapshot) => snapshot.encode_into(&mut buf),
            ServerMessage::Voice(signal) => signal.encode_into(&mut buf),
        }
        buf.freeze()
    }

    /// Dispatches on the first byte the way browser clients do: known server
    /// tags first, anything else is read as an untagged game-state frame.
    /// A state frame whose truncated game id collides with a tag is therefore
    /// misread; that ambiguity is inherent to the wire format.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let tag = *frame.first().ok_or(ProtocolError::Empty)?;
        let mut body = &frame[1..];

        if let Some(kind) = SignalKind::from_tag(tag) {
            return VoiceSignal::decode(kind, frame).map(ServerMessage::Voice);
        }

        match tag {
            JOIN_REJECTED => {
                ensure_len(frame, 6)?;
                let game_id = body.get_u32();
                let value = body.get_u8();
                let reason = JoinError::from_u8(value).ok_or(ProtocolError::InvalidField {
                    field: "join error",
                    value,
                })?;
                Ok(ServerMessage::JoinRejected { game_id, reason })
            }
            MOVE_RESULT => {
                ensure_len(frame, 9)?;
                let game_id = body.get_u32();
                let mv = Move {
                    from: body.get_u8(),
                    to: body.get_u8(),
                    promo: body.get_u8(),
                };
                let value = body.get_u8();
                let status = MoveStatus::from_u8(value).ok_or(ProtocolError::InvalidField {
                    field: "move status",
                    value,
                })?;
                Ok(ServerMessage::MoveResult {
                    game_id,
                    mv,
                    status,
                })
            }
            GAME_CREATED => {
                ensure_len(frame, 5)?;
                Ok(ServerMessage::GameCreated {
                    game_id: body.get_u32(),
                })
            }
            GAME_LIST => {
                ensure_len(frame, 2)?;
                let count = body.get_u8() as usize;
                ensure_len(frame, 2 + count * 5)?;
                let mut games = Vec::with_capacity(count);
                for _ in 0..count {
                    let game_id = body.get_u32();
                    let value = body.get_u8();
                    let open_seat = Seat::from_u8(value).ok_or(ProtocolError::InvalidField {
                        field: "open seat",
                        value,
                    })?;
                    games.push(AvailableGame { game_id, open_seat });
                }
                Ok(ServerMessage::GameList(games))
            }
            _ => GameSnapshot::decode(frame).map(ServerMessage::GameState),
        }
    }
}
