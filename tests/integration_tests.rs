//! Integration tests for the chess server
//!
//! Every test boots a real server on an ephemeral port and talks to it over
//! WebSockets with `ChessClient`, the same way a player would.

use chess_client::{ChessClient, ClientError};
use chess_server::network::Server;
use chess_shared::protocol::{
    AvailableGame, ClientMessage, GameSnapshot, ServerMessage, SignalKind, VoiceSignal,
};
use chess_shared::{EndReason, GameStatus, JoinError, Move, MoveStatus, Seat, INITIAL_BOARD};
use std::time::Duration;
use tokio::time::timeout;
use tokio_test::assert_ok;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server() -> String {
    let mut server = Server::new("127.0.0.1:0", "/chess", 64)
        .await
        .expect("Failed to bind server");
    let url = format!("ws://{}/chess", server.local_addr());
    tokio::spawn(async move { server.run().await });
    url
}

async fn connect(url: &str) -> ChessClient {
    ChessClient::connect(url).await.expect("Failed to connect")
}

async fn next(client: &mut ChessClient) -> ServerMessage {
    timeout(TIMEOUT, client.next_message())
        .await
        .expect("Timed out waiting for server")
        .expect("Failed to receive message")
}

async fn next_state(client: &mut ChessClient) -> GameSnapshot {
    match next(client).await {
        ServerMessage::GameState(snapshot) => snapshot,
        other => panic!("Expected game state, got {:?}", other),
    }
}

async fn join(client: &mut ChessClient, game_id: u32, seat: Option<Seat>) -> GameSnapshot {
    assert_ok!(
        client
            .send(&ClientMessage::JoinGame {
                game_id,
                requested_seat: seat,
            })
            .await
    );
    next_state(client).await
}

async fn play(client: &mut ChessClient, game_id: u32, from: u8, to: u8) {
    assert_ok!(
        client
            .send(&ClientMessage::MovePiece {
                game_id,
                mv: Move::new(from, to),
            })
            .await
    );
}

/// Two clients seated white and black in `game_id`.
async fn seated_pair(url: &str, game_id: u32) -> (ChessClient, ChessClient) {
    let mut white = connect(url).await;
    let mut black = connect(url).await;
    assert_eq!(
        join(&mut white, game_id, Some(Seat::White)).await.assigned_seat,
        Some(Seat::White)
    );
    assert_eq!(
        join(&mut black, game_id, Some(Seat::White)).await.assigned_seat,
        Some(Seat::Black)
    );
    (white, black)
}

/// LOBBY TESTS
mod lobby_tests {
    use super::*;

    #[tokio::test]
    async fn create_game_returns_sequential_ids() {
        let url = start_server().await;
        let mut client = connect(&url).await;

        client.send(&ClientMessage::CreateGame).await.unwrap();
        assert_eq!(next(&mut client).await, ServerMessage::GameCreated { game_id: 1 });
        client.send(&ClientMessage::CreateGame).await.unwrap();
        assert_eq!(next(&mut client).await, ServerMessage::GameCreated { game_id: 2 });
    }

    #[tokio::test]
    async fn list_shows_half_filled_games() {
        let url = start_server().await;
        let mut host = connect(&url).await;
        let mut browser = connect(&url).await;

        browser.send(&ClientMessage::CreateGame).await.unwrap();
        next(&mut browser).await;
        join(&mut host, 50, Some(Seat::Black)).await;

        browser.send(&ClientMessage::ListGames).await.unwrap();
        assert_eq!(
            next(&mut browser).await,
            ServerMessage::GameList(vec![AvailableGame {
                game_id: 50,
                open_seat: Seat::White
            }])
        );
    }
}

/// SEATING TESTS
mod seating_tests {
    use super::*;

    #[tokio::test]
    async fn join_sequencing_rejects_third_player() {
        let url = start_server().await;
        let (mut white, _black) = seated_pair(&url, 10).await;

        let mut third = connect(&url).await;
        third
            .send(&ClientMessage::JoinGame {
                game_id: 10,
                requested_seat: Some(Seat::White),
            })
            .await
            .unwrap();
        assert_eq!(
            next(&mut third).await,
            ServerMessage::JoinRejected {
                game_id: 10,
                reason: JoinError::GameFull
            }
        );
        let closed = timeout(TIMEOUT, third.recv()).await.expect("Timed out");
        assert!(closed.is_none(), "Rejected connection should be closed");

        // The rejected player never became a subscriber.
        play(&mut white, 10, 52, 36).await;
        assert!(matches!(
            next(&mut white).await,
            ServerMessage::MoveResult { .. }
        ));
    }

    #[tokio::test]
    async fn fresh_game_starts_from_initial_position() {
        let url = start_server().await;
        let mut client = connect(&url).await;

        let state = join(&mut client, 3, None).await;
        assert_eq!(state.board, INITIAL_BOARD);
        assert_eq!(state.turn, Seat::White);
        assert_eq!(state.status, GameStatus::Ongoing);
        assert_eq!(state.fullmove_number, 1);
        assert_eq!(state.en_passant, None);
        assert_eq!(state.assigned_seat, Some(Seat::White));
    }

    #[tokio::test]
    async fn state_frame_carries_truncated_game_id() {
        let url = start_server().await;
        let mut client = connect(&url).await;

        let state = join(&mut client, 300, None).await;
        assert_eq!(state.game_id, 44);
    }

    #[tokio::test]
    async fn state_for_game_101_is_misread_by_tag_dispatch() {
        let url = start_server().await;
        let mut client = connect(&url).await;

        client
            .send(&ClientMessage::JoinGame {
                game_id: 101,
                requested_seat: None,
            })
            .await
            .unwrap();
        let result = timeout(TIMEOUT, client.next_message()).await.expect("Timed out");
        assert!(matches!(result, Err(ClientError::Protocol(_))));
    }
}

/// GAMEPLAY TESTS
mod gameplay_tests {
    use super::*;

    #[tokio::test]
    async fn moves_are_broadcast_to_both_players() {
        let url = start_server().await;
        let (mut white, mut black) = seated_pair(&url, 20).await;

        play(&mut white, 20, 52, 36).await;
        for client in [&mut white, &mut black] {
            assert_eq!(
                next(client).await,
                ServerMessage::MoveResult {
                    game_id: 20,
                    mv: Move::new(52, 36),
                    status: MoveStatus::Ok
                }
            );
        }
        let white_view = next_state(&mut white).await;
        let black_view = next_state(&mut black).await;
        assert_eq!(white_view.board, black_view.board);
        assert_eq!(white_view.turn, Seat::Black);
        assert_eq!(white_view.assigned_seat, Some(Seat::White));
        assert_eq!(black_view.assigned_seat, Some(Seat::Black));

        play(&mut black, 20, 12, 28).await;
        next(&mut black).await;
        let state = next_state(&mut black).await;
        assert_eq!(state.turn, Seat::White);
        assert_eq!(state.fullmove_number, 2);
    }

    #[tokio::test]
    async fn illegal_move_is_reported_without_state() {
        let url = start_server().await;
        let (mut white, _black) = seated_pair(&url, 21).await;

        // Black piece while white is to move.
        play(&mut white, 21, 12, 28).await;
        assert_eq!(
            next(&mut white).await,
            ServerMessage::MoveResult {
                game_id: 21,
                mv: Move::new(12, 28),
                status: MoveStatus::Illegal
            }
        );

        // The next frame is the result of a legal move, not a stray state.
        play(&mut white, 21, 52, 44).await;
        assert!(matches!(
            next(&mut white).await,
            ServerMessage::MoveResult {
                status: MoveStatus::Ok,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn surrender_then_reset() {
        let url = start_server().await;
        let (mut white, mut black) = seated_pair(&url, 22).await;

        white
            .send(&ClientMessage::Surrender {
                game_id: 22,
                seat: Seat::White,
            })
            .await
            .unwrap();
        let state = next_state(&mut black).await;
        assert_eq!(state.status, GameStatus::BlackWins);
        assert_eq!(state.winner, Some(Seat::Black));
        assert_eq!(state.end_reason, EndReason::Surrender);
        next_state(&mut white).await;

        play(&mut white, 22, 52, 36).await;
        assert!(matches!(
            next(&mut white).await,
            ServerMessage::MoveResult {
                status: MoveStatus::AlreadyOver,
                ..
            }
        ));
        assert!(matches!(
            next(&mut black).await,
            ServerMessage::MoveResult {
                status: MoveStatus::AlreadyOver,
                ..
            }
        ));

        black
            .send(&ClientMessage::ResetGame { game_id: 22 })
            .await
            .unwrap();
        let state = next_state(&mut black).await;
        assert_eq!(state.status, GameStatus::Ongoing);
        assert_eq!(state.board, INITIAL_BOARD);
        assert_eq!(state.end_reason, EndReason::None);
        assert_eq!(state.assigned_seat, Some(Seat::Black));
    }

    #[tokio::test]
    async fn disconnect_forfeits_to_remaining_player() {
        let url = start_server().await;
        let (mut white, mut black) = seated_pair(&url, 23).await;

        white.close().await.unwrap();
        drop(white);

        let state = next_state(&mut black).await;
        assert_eq!(state.status, GameStatus::BlackWins);
        assert_eq!(state.winner, Some(Seat::Black));
        assert_eq!(state.end_reason, EndReason::Disconnect);
    }

    #[tokio::test]
    async fn malformed_frames_leave_connection_open() {
        let url = start_server().await;
        let mut client = connect(&url).await;

        assert_ok!(client.send_raw(Vec::new()).await);
        assert_ok!(client.send_raw(vec![2u8, 1, 0]).await);
        assert_ok!(client.send_raw(vec![99u8, 1, 2, 3]).await);
        assert_ok!(client.send_raw(vec![10u8, 0, 0, 0, 1, 0, 50]).await);

        client.send(&ClientMessage::CreateGame).await.unwrap();
        assert_eq!(next(&mut client).await, ServerMessage::GameCreated { game_id: 1 });
    }
}

/// VOICE RELAY TESTS
mod voice_tests {
    use super::*;

    fn signal(kind: SignalKind, game_id: u32, payload: &str) -> VoiceSignal {
        VoiceSignal::new(kind, game_id, payload.as_bytes().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn offer_and_answer_reach_the_opponent() {
        let url = start_server().await;
        let (mut white, mut black) = seated_pair(&url, 30).await;

        let offer = signal(SignalKind::Offer, 30, r#"{"type":"offer","sdp":"v=0"}"#);
        white
            .send(&ClientMessage::Voice(offer.clone()))
            .await
            .unwrap();
        assert_eq!(next(&mut black).await, ServerMessage::Voice(offer));

        let answer = signal(SignalKind::Answer, 30, r#"{"type":"answer","sdp":"v=0"}"#);
        black
            .send(&ClientMessage::Voice(answer.clone()))
            .await
            .unwrap();
        assert_eq!(next(&mut white).await, ServerMessage::Voice(answer));
    }

    #[tokio::test]
    async fn signals_from_unseated_clients_are_dropped() {
        let url = start_server().await;
        let (mut white, mut black) = seated_pair(&url, 31).await;
        let mut outsider = connect(&url).await;

        outsider
            .send(&ClientMessage::Voice(signal(SignalKind::Offer, 31, "{}")))
            .await
            .unwrap();

        // Nothing from the outsider arrives; the next frame black sees is
        // white's candidate.
        let candidate = signal(SignalKind::IceCandidate, 31, r#"{"candidate":"c"}"#);
        white
            .send(&ClientMessage::Voice(candidate.clone()))
            .await
            .unwrap();
        assert_eq!(next(&mut black).await, ServerMessage::Voice(candidate));
    }
}
