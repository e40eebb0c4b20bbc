use matchpool_core::Amount;
use serde::{Deserialize, Serialize};

/// Notifications emitted for off-engine indexers and clients.
///
/// Delivery is best-effort over a broadcast channel; the engine never
/// blocks or fails an operation because nobody is listening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    MatchAdded {
        round: u64,
        handle: String,
        outcome_slots: u8,
    },
    BetPlaced {
        round: u64,
        player: String,
        predictions: Vec<u8>,
    },
    Distributed {
        round: u64,
        player: String,
        handle: String,
        winning_index: u8,
        paid: Amount,
    },
}
