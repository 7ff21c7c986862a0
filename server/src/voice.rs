//! Blind relay for voice-chat signaling between the two seats of a game.
//!
//! Offers, answers and ICE candidates are forwarded to the opponent without
//! looking at the payload. Every failure is a silent drop.

use crate::client_manager::ClientId;
use crate::registry::GameRegistry;
use chess_shared::protocol::{SignalKind, VoiceSignal};
use log::debug;
use std::collections::{BTreeSet, HashMap};

/// Tracks which connections negotiated voice in which game. Only used to
/// tear sessions down on disconnect; routing never consults it.
#[derive(Debug, Default)]
pub struct VoiceRelay {
    sessions: HashMap<u32, BTreeSet<ClientId>>,
}

impl VoiceRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks the connection `signal` should be delivered to.
    ///
    /// The sender must be seated in the signal's game and an opponent must
    /// hold the other seat.
    pub fn route(
        &mut self,
        registry: &GameRegistry,
        sender: ClientId,
        signal: &VoiceSignal,
    ) -> Option<ClientId> {
        let binding = match registry.binding(sender) {
            Some(binding) if binding.game_id == signal.game_id => binding,
            _ => {
                debug!(
                    "Dropping {:?} from client {}: not seated in game {}",
                    signal.kind, sender, signal.game_id
                );
                return None;
            }
        };
        let table = registry.table(binding.game_id)?;

        if matches!(signal.kind, SignalKind::Offer | SignalKind::Answer) {
            self.sessions
                .entry(binding.game_id)
                .or_default()
                .insert(sender);
        }

        let target = table.seat_holder(binding.seat.opponent());
        if target.is_none() {
            debug!(
                "Dropping {:?} in game {}: opponent seat is empty",
                signal.kind, binding.game_id
            );
        }
        target
    }

    #[cfg(test)]
    pub(crate) fn is_member(&self, game_id: u32, client: ClientId) -> bool {
        self.sessions
            .get(&game_id)
            .is_some_and(|members| members.contains(&client))
    }

    /// Removes every voice session `client` took part in.
    pub fn on_disconnect(&mut self, client: ClientId) {
        self.sessions.retain(|game_id, members| {
            let keep = !members.contains(&client);
            if !keep {
                debug!("Voice session in game {} torn down", game_id);
            }
            keep
        });
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_shared::Seat;

    fn signal(kind: SignalKind, game_id: u32) -> VoiceSignal {
        VoiceSignal::new(kind, game_id, &b"{}"[..]).unwrap()
    }

    fn seated_pair() -> GameRegistry {
        let mut registry = GameRegistry::new();
        registry.join(1, 4, Some(Seat::White));
        registry.join(2, 4, Some(Seat::Black));
        registry
    }

    #[test]
    fn test_routes_to_opponent() {
        let registry = seated_pair();
        let mut relay = VoiceRelay::new();

        assert_eq!(
            relay.route(&registry, 1, &signal(SignalKind::Offer, 4)),
            Some(2)
        );
        assert_eq!(
            relay.route(&registry, 2, &signal(SignalKind::Answer, 4)),
            Some(1)
        );
        assert!(relay.is_member(4, 1));
        assert!(relay.is_member(4, 2));
    }

    #[test]
    fn test_ice_candidates_do_not_create_membership() {
        let registry = seated_pair();
        let mut relay = VoiceRelay::new();

        assert_eq!(
            relay.route(&registry, 1, &signal(SignalKind::IceCandidate, 4)),
            Some(2)
        );
        assert!(!relay.is_member(4, 1));
        assert_eq!(relay.session_count(), 0);
    }

    #[test]
    fn test_unseated_sender_is_dropped() {
        let mut registry = seated_pair();
        registry.join(3, 9, None);
        let mut relay = VoiceRelay::new();

        assert_eq!(relay.route(&registry, 99, &signal(SignalKind::Offer, 4)), None);
        // Seated, but in a different game.
        assert_eq!(relay.route(&registry, 3, &signal(SignalKind::Offer, 4)), None);
        assert!(!relay.is_member(4, 3));
    }

    #[test]
    fn test_missing_opponent_is_dropped() {
        let mut registry = GameRegistry::new();
        registry.join(1, 4, Some(Seat::White));
        let mut relay = VoiceRelay::new();

        assert_eq!(relay.route(&registry, 1, &signal(SignalKind::Offer, 4)), None);
        assert!(relay.is_member(4, 1));
    }

    #[test]
    fn test_disconnect_removes_session_wholesale() {
        let registry = seated_pair();
        let mut relay = VoiceRelay::new();
        relay.route(&registry, 1, &signal(SignalKind::Offer, 4));
        relay.route(&registry, 2, &signal(SignalKind::Answer, 4));

        relay.on_disconnect(2);
        assert!(!relay.is_member(4, 1));
        assert!(!relay.is_member(4, 2));
        assert_eq!(relay.session_count(), 0);
    }
}
