use chess_client::game::ClientGameState;
use chess_client::input::{parse_command, parse_seat, Command, HELP};
use chess_client::network::ChessClient;
use chess_client::rendering::{describe, render_board};
use chess_shared::protocol::{ClientMessage, ServerMessage};
use chess_shared::Seat;
use clap::Parser;
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server WebSocket URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:9001/chess")]
    url: String,

    /// Game to join on startup
    #[arg(short, long)]
    game: Option<u32>,

    /// Preferred seat when joining on startup (white or black)
    #[arg(short, long)]
    seat: Option<String>,
}

fn print_state(state: &ClientGameState) {
    if let Some(snapshot) = &state.snapshot {
        let perspective = state.seat.unwrap_or(Seat::White);
        println!("{}", render_board(&snapshot.board, perspective));
        println!("{}", describe(snapshot));
    }
}

fn report(message: &ServerMessage, state: &ClientGameState) {
    match message {
        ServerMessage::GameState(_) => print_state(state),
        ServerMessage::MoveResult { mv, status, .. } => {
            println!("move {} -> {}: {:?}", mv.from, mv.to, status);
        }
        ServerMessage::GameCreated { game_id } => println!("created game {}", game_id),
        ServerMessage::GameList(games) if games.is_empty() => println!("no open games"),
        ServerMessage::GameList(games) => {
            for game in games {
                println!("game {}: {:?} open", game.game_id, game.open_seat);
            }
        }
        ServerMessage::JoinRejected { game_id, reason } => {
            println!("join of game {} rejected: {:?}", game_id, reason);
        }
        ServerMessage::Voice(signal) => match signal.payload_str() {
            Ok(payload) => println!("{:?} from opponent: {}", signal.kind, payload),
            Err(_) => warn!("Voice payload is not UTF-8"),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Connecting to: {}", args.url);
    let mut client = ChessClient::connect(&args.url).await?;
    let mut state = ClientGameState::new();

    if let Some(game_id) = args.game {
        let command = Command::Join {
            game_id,
            seat: args.seat.as_deref().and_then(parse_seat),
        };
        if let Some(message) = command.to_message(&state)? {
            state.joining(game_id);
            client.send(&message).await?;
        }
    }

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };

                match command {
                    Command::Quit => break,
                    Command::Help => println!("{}", HELP),
                    Command::Board => print_state(&state),
                    _ => match command.to_message(&state) {
                        Ok(Some(message)) => {
                            if let ClientMessage::JoinGame { game_id, .. } = message {
                                state.joining(game_id);
                            }
                            client.send(&message).await?;
                        }
                        Ok(None) => {}
                        Err(e) => println!("{}", e),
                    },
                }
            }

            message = client.recv() => {
                match message {
                    Some(Ok(message)) => {
                        state.apply(&message);
                        report(&message, &state);
                    }
                    Some(Err(e)) => error!("Error receiving message: {}", e),
                    None => {
                        info!("Server closed the connection");
                        return Ok(());
                    }
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}
