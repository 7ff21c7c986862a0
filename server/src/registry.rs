//! Game table, seat assignment and subscriber bookkeeping
//!
//! The registry owns every `Game` for the lifetime of the process together
//! with who sits where and who listens. It never talks to the network; the
//! session layer turns the outcomes returned here into frames.

use crate::client_manager::ClientId;
use crate::game::Game;
use chess_shared::protocol::AvailableGame;
use chess_shared::Seat;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One game plus its seating and broadcast audience.
#[derive(Debug)]
pub struct GameTable {
    pub game: Game,
    seats: [Option<ClientId>; 2],
    subscribers: BTreeSet<ClientId>,
}

impl GameTable {
    fn new(id: u32) -> Self {
        Self {
            game: Game::new(id),
            seats: [None, None],
            subscribers: BTreeSet::new(),
        }
    }

    pub fn seat_holder(&self, seat: Seat) -> Option<ClientId> {
        self.seats[seat.index()]
    }

    /// Seat held by `client` in this game, `None` for spectators.
    pub fn seat_of(&self, client: ClientId) -> Option<Seat> {
        [Seat::White, Seat::Black]
            .into_iter()
            .find(|&seat| self.seat_holder(seat) == Some(client))
    }

    pub fn occupied_seats(&self) -> usize {
        self.seats.iter().flatten().count()
    }

    pub fn is_subscribed(&self, client: ClientId) -> bool {
        self.subscribers.contains(&client)
    }

    pub fn subscribers(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.subscribers.iter().copied()
    }

    /// The single open seat of a half-filled ongoing game.
    fn open_seat(&self) -> Option<Seat> {
        if self.game.is_terminal() || self.occupied_seats() != 1 {
            return None;
        }
        [Seat::White, Seat::Black]
            .into_iter()
            .find(|&seat| self.seat_holder(seat).is_none())
    }
}

/// Where a connection is seated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatBinding {
    pub game_id: u32,
    pub seat: Seat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The connection already held this seat; nothing changed.
    AlreadySeated(Seat),
    Seated(Seat),
    Full,
}

/// A game a disconnecting client was part of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub game_id: u32,
    /// True when the client's seat forfeited an ongoing game.
    pub forfeited: bool,
}

pub struct GameRegistry {
    games: BTreeMap<u32, GameTable>,
    bindings: HashMap<ClientId, SeatBinding>,
    next_game_id: u32,
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            games: BTreeMap::new(),
            bindings: HashMap::new(),
            next_game_id: 1,
        }
    }

    /// Allocates the next unused id. Ids already taken by lazily created
    /// games are skipped, and no id is ever handed out twice.
    pub fn create_game(&mut self) -> u32 {
        while self.games.contains_key(&self.next_game_id) {
            self.next_game_id = self.next_game_id.wrapping_add(1).max(1);
        }
        let id = self.next_game_id;
        self.next_game_id = self.next_game_id.wrapping_add(1).max(1);

        self.games.insert(id, GameTable::new(id));
        info!("Created game {}", id);
        id
    }

    pub fn get_or_create(&mut self, game_id: u32) -> &mut GameTable {
        self.games.entry(game_id).or_insert_with(|| {
            info!("Lazily created game {}", game_id);
            GameTable::new(game_id)
        })
    }

    pub fn table(&self, game_id: u32) -> Option<&GameTable> {
        self.games.get(&game_id)
    }

    pub fn table_mut(&mut self, game_id: u32) -> Option<&mut GameTable> {
        self.games.get_mut(&game_id)
    }

    pub fn binding(&self, client: ClientId) -> Option<SeatBinding> {
        self.bindings.get(&client).copied()
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    /// Seats `client` in `game_id`, creating the game on first reference.
    ///
    /// Without a preference white is tried before black. A finished game with
    /// both seats empty is reset before seating. On `Full` nothing changes.
    pub fn join(
        &mut self,
        client: ClientId,
        game_id: u32,
        requested: Option<Seat>,
    ) -> JoinOutcome {
        if let Some(binding) = self.binding(client) {
            if binding.game_id == game_id {
                if let Some(table) = self.games.get_mut(&game_id) {
                    if table.seat_holder(binding.seat) == Some(client) {
                        table.subscribers.insert(client);
                        return JoinOutcome::AlreadySeated(binding.seat);
                    }
                }
            }
        }

        let table = self.get_or_create(game_id);
        if table.game.is_terminal() && table.occupied_seats() == 0 {
            info!("Recycling finished game {} for new players", game_id);
            table.game.reset();
        }

        let preference = requested.unwrap_or(Seat::White);
        let seat = match [preference, preference.opponent()]
            .into_iter()
            .find(|&seat| table.seat_holder(seat).is_none())
        {
            Some(seat) => seat,
            None => {
                info!("Client {} rejected from full game {}", client, game_id);
                return JoinOutcome::Full;
            }
        };

        table.seats[seat.index()] = Some(client);
        table.subscribers.insert(client);
        self.bindings.insert(client, SeatBinding { game_id, seat });
        info!("Client {} seated as {:?} in game {}", client, seat, game_id);
        JoinOutcome::Seated(seat)
    }

    /// Ongoing games with exactly one occupied seat, in id order.
    pub fn list_available(&self) -> Vec<AvailableGame> {
        self.games
            .iter()
            .filter_map(|(&game_id, table)| {
                table
                    .open_seat()
                    .map(|open_seat| AvailableGame { game_id, open_seat })
            })
            .collect()
    }

    /// Connection currently sitting opposite `client` in its bound game.
    pub fn opponent_of(&self, client: ClientId) -> Option<ClientId> {
        let binding = self.binding(client)?;
        self.table(binding.game_id)?
            .seat_holder(binding.seat.opponent())
    }

    /// Drops `client` from every game it listens to or sits in. A seat held
    /// in an ongoing game forfeits that game to the other seat.
    pub fn disconnect(&mut self, client: ClientId) -> Vec<Departure> {
        self.bindings.remove(&client);

        let mut departures = Vec::new();
        for (&game_id, table) in self.games.iter_mut() {
            let was_subscribed = table.subscribers.remove(&client);
            let seat = table.seat_of(client);
            if let Some(seat) = seat {
                table.seats[seat.index()] = None;
            }
            if !was_subscribed && seat.is_none() {
                continue;
            }

            let forfeited = match seat {
                Some(seat) => table.game.forfeit(seat).is_ok(),
                None => false,
            };
            debug!(
                "Client {} left game {} (seat {:?}, forfeited {})",
                client, game_id, seat, forfeited
            );
            departures.push(Departure { game_id, forfeited });
        }
        departures
    }
}
